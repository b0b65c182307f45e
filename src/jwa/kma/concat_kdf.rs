//! Concatenation KDF, NIST SP 800-56A section 5.8.1, with SHA-256 as the
//! hash function (the only one JOSE registers).

use sha2::{Digest, Sha256};

/// Derive `key_bits` of key material from the shared secret `z`.
///
/// `OtherInfo` is assembled from the length-prefixed AlgorithmID, PartyUInfo
/// and PartyVInfo, the 32-bit big-endian `SuppPubInfo` (the key length in
/// bits) and, for ECDH-1PU key wrapping, the length-prefixed content
/// authentication tag appended last.
pub(crate) fn derive(
    z: &[u8],
    algorithm_id: &str,
    apu: &[u8],
    apv: &[u8],
    key_bits: usize,
    cctag: Option<&[u8]>,
) -> Vec<u8> {
    let mut other_info = Vec::new();
    push_length_prefixed(&mut other_info, algorithm_id.as_bytes());
    push_length_prefixed(&mut other_info, apu);
    push_length_prefixed(&mut other_info, apv);
    other_info.extend_from_slice(&(key_bits as u32).to_be_bytes());
    if let Some(tag) = cctag {
        push_length_prefixed(&mut other_info, tag);
    }

    let key_len = key_bits.div_ceil(8);
    let reps = key_len.div_ceil(32);
    let mut derived = Vec::with_capacity(reps * 32);
    for counter in 1..=reps as u32 {
        let digest = Sha256::new()
            .chain_update(counter.to_be_bytes())
            .chain_update(z)
            .chain_update(&other_info)
            .finalize();
        derived.extend_from_slice(&digest);
    }
    derived.truncate(key_len);
    derived
}

fn push_length_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    // https://datatracker.ietf.org/doc/html/rfc7518#appendix-C
    #[test]
    fn rfc7518_appendix_c_vector() {
        let z: [u8; 32] = [
            158, 86, 217, 29, 129, 113, 53, 211, 114, 131, 66, 131, 191, 132, 38, 156, 251, 49,
            110, 163, 218, 128, 106, 72, 246, 218, 167, 121, 140, 254, 144, 196,
        ];
        let derived = derive(&z, "A128GCM", b"Alice", b"Bob", 128, None);
        assert_eq!(
            crate::codec::base64url_encode(&derived),
            "VqqN6vgjbSBcIijNcacQGg"
        );
    }

    #[test]
    fn derives_more_than_one_block_when_needed() {
        let derived = derive(&[1, 2, 3], "A256CBC-HS512", b"", b"", 512, None);
        assert_eq!(derived.len(), 64);
        // both halves must be distinct hash outputs
        assert_ne!(derived[..32], derived[32..]);
    }

    #[test]
    fn tag_participates_in_derivation() {
        let z = [7u8; 32];
        let plain = derive(&z, "ECDH-1PU+A128KW", b"", b"", 128, None);
        let bound = derive(&z, "ECDH-1PU+A128KW", b"", b"", 128, Some(b"tag"));
        assert_ne!(plain, bound);
    }
}
