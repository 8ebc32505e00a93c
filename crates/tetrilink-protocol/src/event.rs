//! Discrete game events and their wire form.
//!
//! Every event kind is one variant of [`GameEvent`]. Parsing and encoding
//! are single `match` expressions, so adding a kind without teaching both
//! directions about it fails to compile.

use crate::envelope::prefix;
use crate::{AttackBlockPacket, Codec, Envelope, ProtocolError};

/// A timed power-up fired at the opponent (or at oneself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemEffect {
    SpeedUp { duration_ms: u64 },
    SpeedDown { duration_ms: u64 },
    VisionBlock { duration_ms: u64 },
}

impl ItemEffect {
    /// The wire prefix for this effect.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::SpeedUp { .. } => prefix::ITEM_SPEED_UP,
            Self::SpeedDown { .. } => prefix::ITEM_SPEED_DOWN,
            Self::VisionBlock { .. } => prefix::ITEM_VISION_BLOCK,
        }
    }

    /// How long the effect lasts once activated.
    pub fn duration_ms(&self) -> u64 {
        match *self {
            Self::SpeedUp { duration_ms }
            | Self::SpeedDown { duration_ms }
            | Self::VisionBlock { duration_ms } => duration_ms,
        }
    }
}

/// One-shot events carried by the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A penalty row the receiver must queue as incoming garbage.
    AttackGenerated(AttackBlockPacket),
    /// The sender consumed its queued garbage; the receiver may drop its
    /// bookkeeping copies.
    AttackApplied,
    /// A timed item was activated.
    Item(ItemEffect),
    /// The sender paused (`true`) or resumed (`false`).
    PauseToggled(bool),
}

impl GameEvent {
    /// Every prefix an event can arrive under.
    pub const PREFIXES: [&'static str; 6] = [
        prefix::ATTACK_GENERATE,
        prefix::ATTACK_APPLY,
        prefix::ITEM_SPEED_UP,
        prefix::ITEM_SPEED_DOWN,
        prefix::ITEM_VISION_BLOCK,
        prefix::PAUSE,
    ];

    /// Encodes the event into an envelope.
    pub fn to_envelope<C: Codec>(&self, codec: &C) -> Result<Envelope, ProtocolError> {
        Ok(match self {
            Self::AttackGenerated(packet) => {
                Envelope::encode(codec, prefix::ATTACK_GENERATE, packet)?
            }
            Self::AttackApplied => Envelope::bare(prefix::ATTACK_APPLY),
            Self::Item(effect) => {
                Envelope::new(effect.prefix(), effect.duration_ms().to_string())
            }
            Self::PauseToggled(paused) => {
                Envelope::new(prefix::PAUSE, if *paused { "1" } else { "0" })
            }
        })
    }

    /// Decodes an envelope whose prefix is one of [`Self::PREFIXES`].
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownPrefix`] for any other prefix.
    /// - decode/validation errors for a malformed payload.
    pub fn from_envelope<C: Codec>(env: &Envelope, codec: &C) -> Result<Self, ProtocolError> {
        match env.prefix.as_str() {
            prefix::ATTACK_GENERATE => {
                let packet: AttackBlockPacket = env.decode(codec)?;
                packet.validate()?;
                Ok(Self::AttackGenerated(packet))
            }
            prefix::ATTACK_APPLY => Ok(Self::AttackApplied),
            prefix::ITEM_SPEED_UP => Ok(Self::Item(ItemEffect::SpeedUp {
                duration_ms: parse_millis(&env.payload)?,
            })),
            prefix::ITEM_SPEED_DOWN => Ok(Self::Item(ItemEffect::SpeedDown {
                duration_ms: parse_millis(&env.payload)?,
            })),
            prefix::ITEM_VISION_BLOCK => Ok(Self::Item(ItemEffect::VisionBlock {
                duration_ms: parse_millis(&env.payload)?,
            })),
            prefix::PAUSE => match env.payload.as_str() {
                "1" => Ok(Self::PauseToggled(true)),
                "0" => Ok(Self::PauseToggled(false)),
                other => Err(ProtocolError::InvalidMessage(format!(
                    "pause flag must be 0 or 1, got {other:?}"
                ))),
            },
            _ => Err(ProtocolError::UnknownPrefix(env.to_line())),
        }
    }
}

fn parse_millis(payload: &str) -> Result<u64, ProtocolError> {
    payload.trim().parse().map_err(|_| {
        ProtocolError::InvalidMessage(format!("expected a duration in millis, got {payload:?}"))
    })
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::JsonCodec;

    #[test]
    fn test_item_to_envelope_uses_effect_prefix() {
        let env = GameEvent::Item(ItemEffect::VisionBlock { duration_ms: 3000 })
            .to_envelope(&JsonCodec)
            .unwrap();
        assert_eq!(env.to_line(), "item:vision-block:3000");
    }

    #[test]
    fn test_attack_apply_is_bare() {
        let env = GameEvent::AttackApplied.to_envelope(&JsonCodec).unwrap();
        assert_eq!(env.to_line(), "attack-apply");
    }

    #[test]
    fn test_from_envelope_speed_down() {
        let env = Envelope::new(prefix::ITEM_SPEED_DOWN, "1500");
        let event = GameEvent::from_envelope(&env, &JsonCodec).unwrap();
        assert_eq!(event, GameEvent::Item(ItemEffect::SpeedDown { duration_ms: 1500 }));
    }

    #[test]
    fn test_from_envelope_bad_duration_is_invalid() {
        let env = Envelope::new(prefix::ITEM_SPEED_UP, "soon");
        assert!(matches!(
            GameEvent::from_envelope(&env, &JsonCodec),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_from_envelope_bad_pause_flag_is_invalid() {
        let env = Envelope::new(prefix::PAUSE, "yes");
        assert!(GameEvent::from_envelope(&env, &JsonCodec).is_err());
    }

    #[test]
    fn test_from_envelope_unknown_prefix() {
        let env = Envelope::new(prefix::BOARD, "{}");
        assert!(matches!(
            GameEvent::from_envelope(&env, &JsonCodec),
            Err(ProtocolError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn test_from_envelope_ragged_attack_is_invalid() {
        let env = Envelope::new(
            prefix::ATTACK_GENERATE,
            r#"{"boardWidth":3,"occupancyPattern":[true],"colorPerColumn":[1,2,3],"blockTypePerColumn":[0,0,0]}"#,
        );
        assert!(matches!(
            GameEvent::from_envelope(&env, &JsonCodec),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}
