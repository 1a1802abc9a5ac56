//! Normalisation of daemon-reported CIDs to the form `add` returns.
//!
//! `add` is called with `cid-version=0`, so stored identifiers are base58btc
//! sha2-256 multihashes (`Qm...`). Newer daemons key their blockstore by
//! multihash and report `refs/local` entries as base32 CIDv1 (`bafk...`,
//! `bafy...`) instead. Both forms wrap the same multihash, so a CIDv1 with a
//! sha2-256 digest maps back to exactly one CIDv0.

const SHA2_256: u8 = 0x12;
const SHA2_256_LEN: u8 = 32;
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Rewrite `reference` into its CIDv0 form when it has one.
///
/// CIDv0 input is returned unchanged. Anything else that cannot be expressed
/// as CIDv0 (other digests, other multibases) is also returned unchanged.
pub(crate) fn normalize(reference: &str) -> String {
    v1_to_v0(reference).unwrap_or_else(|| reference.to_owned())
}

fn v1_to_v0(reference: &str) -> Option<String> {
    let encoded = reference.strip_prefix('b')?;
    let bytes = decode_base32(encoded)?;
    let (version, rest) = read_varint(&bytes)?;
    if version != 1 {
        return None;
    }
    let (_codec, multihash) = read_varint(rest)?;
    match multihash {
        [SHA2_256, SHA2_256_LEN, digest @ ..] if digest.len() == usize::from(SHA2_256_LEN) => {
            Some(bs58::encode(multihash).into_string())
        }
        _ => None,
    }
}

/// Unsigned LEB128, as used for multiformats prefixes.
fn read_varint(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().enumerate().take(9) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, &bytes[i + 1..]));
        }
    }
    None
}

/// RFC 4648 base32, lowercase, unpadded.
fn decode_base32(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for c in input.bytes() {
        let value = BASE32_ALPHABET.iter().position(|a| *a == c)?;
        buffer = (buffer << 5) | u32::try_from(value).ok()?;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(u8::try_from((buffer >> bits) & 0xff).ok()?);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0: &str = "QmTeHHV878utbtigQ8FeNPJ1rNqNXEPHTN9KWwF78hMYpf";

    #[test]
    fn raw_leaf_cid_maps_to_v0() {
        assert_eq!(
            normalize("bafkreicoz2vbrbjqdr3lbtdbflt4nt5lpplvkrd2kvl7fpyjgn4axvqhva"),
            V0
        );
    }

    #[test]
    fn dag_pb_cid_maps_to_v0() {
        assert_eq!(
            normalize("bafybeicoz2vbrbjqdr3lbtdbflt4nt5lpplvkrd2kvl7fpyjgn4axvqhva"),
            V0
        );
    }

    #[test]
    fn v0_is_left_alone() {
        assert_eq!(normalize(V0), V0);
    }

    #[test]
    fn unconvertible_refs_pass_through() {
        // Not base32 after the prefix.
        assert_eq!(normalize("bad!"), "bad!");
        // Valid base32 but a truncated multihash.
        assert_eq!(normalize("bafkq"), "bafkq");
    }
}
