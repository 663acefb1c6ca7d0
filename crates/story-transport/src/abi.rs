//! Minimal Solidity ABI codec for the story registry.
//!
//! Only the shapes the registry actually returns are supported: a single
//! `address`, a single `string`, the `(string, uint256, uint8)` tuple of
//! `getStoryDetails`, and revert payloads. Selectors are precomputed.

use story_discovery_types::{DiscoveryError, DiscoveryResult, TokenId};

pub const WORD: usize = 32;

/// `ownerOf(uint256)`
pub const OWNER_OF: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
/// `tokenURI(uint256)`
pub const TOKEN_URI: [u8; 4] = [0xc8, 0x7b, 0x56, 0xdd];
/// `getStoryDetails(uint256)`
pub const GET_STORY_DETAILS: [u8; 4] = [0xa3, 0x4d, 0xbc, 0x72];

/// `Error(string)`
pub const ERROR_STRING: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `ERC721NonexistentToken(uint256)`
pub const ERC721_NONEXISTENT_TOKEN: [u8; 4] = [0x7e, 0x27, 0x32, 0x89];

/// `Transfer(address,address,uint256)`
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
/// `StoryMinted(uint256,address,string,string,uint256,uint8)`
pub const STORY_MINTED_TOPIC: &str =
    "0x3c6a678d2c5bc77238450a6a9648a38ab985afee4aac7acab74bf7610b7c4075";

/// Call data for `selector(uint256 id)` as a `0x`-prefixed hex string.
pub fn encode_uint_call(selector: [u8; 4], id: TokenId) -> String {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&uint_word(id));
    format!("0x{}", hex::encode(data))
}

pub fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn decode_hex(data: &str) -> DiscoveryResult<Vec<u8>> {
    let trimmed = data.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| DiscoveryError::Registry(format!("invalid hex `{data}`: {e}")))
}

fn word_at(bytes: &[u8], offset: usize) -> DiscoveryResult<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| DiscoveryError::Registry(format!("ABI data truncated at offset {offset}")))
}

/// Read a word as `u64`. Values that do not fit are an error, not a truncation.
pub fn decode_uint(word: &[u8]) -> DiscoveryResult<u64> {
    if word.len() != WORD {
        return Err(DiscoveryError::Registry(format!(
            "expected a {WORD}-byte word, got {}",
            word.len()
        )));
    }
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(DiscoveryError::Registry("uint256 overflows u64".to_string()));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail))
}

/// Parse a hex quantity (`"0x1b4"`) as returned by `eth_blockNumber` or log topics.
pub fn decode_quantity(value: &str) -> DiscoveryResult<u64> {
    let digits = value.trim().trim_start_matches("0x");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| DiscoveryError::Registry(format!("invalid quantity `{value}`: {e}")))
}

pub fn decode_address(bytes: &[u8]) -> DiscoveryResult<String> {
    let word = word_at(bytes, 0)?;
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn decode_string_at(bytes: &[u8], offset: usize) -> DiscoveryResult<String> {
    let len = decode_uint(word_at(bytes, offset)?)? as usize;
    let start = offset + WORD;
    let raw = start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| DiscoveryError::Registry("ABI string truncated".to_string()))?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| DiscoveryError::Registry(format!("ABI string is not UTF-8: {e}")))
}

/// Decode a lone dynamic `string` return value.
pub fn decode_string(bytes: &[u8]) -> DiscoveryResult<String> {
    let offset = decode_uint(word_at(bytes, 0)?)? as usize;
    decode_string_at(bytes, offset)
}

/// Decode `(string storyHash, uint256 imageCount, uint8 contentType)`.
pub fn decode_story_details(bytes: &[u8]) -> DiscoveryResult<(String, u64, u8)> {
    let offset = decode_uint(word_at(bytes, 0)?)? as usize;
    let image_count = decode_uint(word_at(bytes, WORD)?)?;
    let content_type = decode_uint(word_at(bytes, 2 * WORD)?)?;
    let content_type = u8::try_from(content_type)
        .map_err(|_| DiscoveryError::Registry(format!("content type {content_type} overflows uint8")))?;
    let story_hash = decode_string_at(bytes, offset)?;
    Ok((story_hash, image_count, content_type))
}

/// Human readable form of revert data, when it is one of the errors we know.
pub fn decode_revert(bytes: &[u8]) -> Option<String> {
    let (selector, body) = (bytes.get(..4)?, bytes.get(4..)?);
    if selector == ERROR_STRING {
        return decode_string(body).ok();
    }
    if selector == ERC721_NONEXISTENT_TOKEN {
        let id = decode_uint(word_at(body, 0).ok()?).ok()?;
        return Some(format!("ERC721NonexistentToken({id})"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_string_words(s: &str) -> Vec<u8> {
        let mut out = uint_word(s.len() as u64).to_vec();
        let mut data = s.as_bytes().to_vec();
        data.resize(s.len().div_ceil(WORD) * WORD, 0);
        out.extend(data);
        out
    }

    #[test]
    fn test_encode_call() {
        assert_eq!(
            encode_uint_call(OWNER_OF, 7),
            format!("0x6352211e{}07", "0".repeat(62))
        );
    }

    #[test]
    fn test_decode_address() {
        let mut word = [0u8; WORD];
        word[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(
            decode_address(&word).unwrap(),
            format!("0x{}", "ab".repeat(20))
        );
        assert!(decode_address(&[]).is_err());
    }

    #[test]
    fn test_decode_string() {
        let mut bytes = uint_word(32).to_vec();
        bytes.extend(encode_string_words("ipfs://bafyexample"));
        assert_eq!(decode_string(&bytes).unwrap(), "ipfs://bafyexample");
    }

    #[test]
    fn test_decode_story_details() {
        let mut bytes = uint_word(96).to_vec();
        bytes.extend(uint_word(3));
        bytes.extend(uint_word(1));
        bytes.extend(encode_string_words("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"));
        let (hash, images, kind) = decode_story_details(&bytes).unwrap();
        assert_eq!(hash, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
        assert_eq!(images, 3);
        assert_eq!(kind, 1);
    }

    #[test]
    fn test_truncated_data_is_registry_error() {
        let bytes = uint_word(32).to_vec();
        assert!(matches!(decode_string(&bytes), Err(DiscoveryError::Registry(_))));
        assert!(matches!(decode_string(&[]), Err(DiscoveryError::Registry(_))));
    }

    #[test]
    fn test_decode_revert() {
        let mut data = ERC721_NONEXISTENT_TOKEN.to_vec();
        data.extend(uint_word(12));
        assert_eq!(decode_revert(&data).as_deref(), Some("ERC721NonexistentToken(12)"));

        let mut data = ERROR_STRING.to_vec();
        data.extend(uint_word(32));
        data.extend(encode_string_words("ERC721: invalid token ID"));
        assert_eq!(decode_revert(&data).as_deref(), Some("ERC721: invalid token ID"));

        assert_eq!(decode_revert(&[0xde, 0xad]), None);
    }

    #[test]
    fn test_decode_quantity() {
        assert_eq!(decode_quantity("0x1b4").unwrap(), 436);
        assert_eq!(decode_quantity("0x0").unwrap(), 0);
        assert_eq!(
            decode_quantity("0x0000000000000000000000000000000000000000000000000000000000000009").unwrap(),
            9
        );
        assert!(decode_quantity("0xzz").is_err());
    }
}
