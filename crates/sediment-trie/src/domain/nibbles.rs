//! Nibble paths: half-byte key representation for trie traversal.

use sediment_types::KeyHash;

/// Nibble path for trie traversal.
///
/// Keys are converted to nibbles (half-bytes, 0-15) for traversal through
/// the trie. A 32-byte key hash becomes 64 nibbles.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nibbles(pub Vec<u8>);

impl Nibbles {
    /// Create nibbles from a 32-byte key hash.
    pub fn from_key(key: &KeyHash) -> Self {
        Self::from_bytes(key)
    }

    /// Create nibbles from arbitrary bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Nibbles(nibbles)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get nibble at index.
    pub fn at(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Get a slice of nibbles starting at offset.
    pub fn slice(&self, start: usize) -> Self {
        Nibbles(self.0[start..].to_vec())
    }

    /// Append a single nibble, returning the extended path.
    pub fn push(&self, nibble: u8) -> Self {
        let mut out = self.0.clone();
        out.push(nibble);
        Nibbles(out)
    }

    /// Concatenate another path onto this one.
    pub fn join(&self, other: &Nibbles) -> Self {
        let mut out = self.0.clone();
        out.extend_from_slice(&other.0);
        Nibbles(out)
    }

    /// Find common prefix length with another nibbles path.
    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Pack a full-length (64 nibble) path back into a 32-byte key hash.
    ///
    /// Returns None when the path is not exactly key-sized.
    pub fn to_key(&self) -> Option<KeyHash> {
        if self.0.len() != 64 {
            return None;
        }
        let mut key = [0u8; 32];
        for (i, pair) in self.0.chunks(2).enumerate() {
            key[i] = (pair[0] << 4) | pair[1];
        }
        Some(key)
    }

    /// Encode nibbles with hex-prefix for RLP encoding.
    ///
    /// First nibble encodes flags: 0=extension even, 1=extension odd,
    /// 2=leaf even, 3=leaf odd. For odd lengths the first path nibble
    /// shares the flag byte.
    pub fn encode_hex_prefix(&self, is_leaf: bool) -> Vec<u8> {
        let odd = self.len() % 2 == 1;
        let prefix = if is_leaf { 2 } else { 0 } + if odd { 1 } else { 0 };

        let mut result = Vec::with_capacity(self.len() / 2 + 1);
        if odd {
            result.push((prefix << 4) | self.0[0]);
            for chunk in self.0[1..].chunks(2) {
                result.push((chunk[0] << 4) | chunk[1]);
            }
        } else {
            result.push(prefix << 4);
            for chunk in self.0.chunks(2) {
                result.push((chunk[0] << 4) | chunk[1]);
            }
        }
        result
    }

    /// Decode hex-prefix encoded bytes back to (nibbles, is_leaf).
    pub fn decode_hex_prefix(encoded: &[u8]) -> Option<(Self, bool)> {
        let first = *encoded.first()?;
        let prefix = first >> 4;
        if prefix > 3 {
            return None;
        }
        let is_leaf = prefix >= 2;
        let odd = prefix % 2 == 1;

        let mut nibbles = Vec::with_capacity(encoded.len() * 2);
        if odd {
            nibbles.push(first & 0x0F);
        }
        for &byte in &encoded[1..] {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Some((Nibbles(nibbles), is_leaf))
    }
}

impl std::fmt::Display for Nibbles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for n in &self.0 {
            write!(f, "{n:x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_from_key() {
        let mut key = [0u8; 32];
        key[0] = 0xAB;
        key[31] = 0xFF;
        let nibbles = Nibbles::from_key(&key);
        assert_eq!(nibbles.len(), 64);
        assert_eq!(nibbles.at(0), 0x0A);
        assert_eq!(nibbles.at(1), 0x0B);
        assert_eq!(nibbles.at(62), 0x0F);
        assert_eq!(nibbles.at(63), 0x0F);
    }

    #[test]
    fn test_to_key_inverts_from_key() {
        let key = [0x5Au8; 32];
        assert_eq!(Nibbles::from_key(&key).to_key(), Some(key));
        assert_eq!(Nibbles(vec![1, 2, 3]).to_key(), None);
    }

    #[test]
    fn test_hex_prefix_flags() {
        let even = Nibbles(vec![1, 2, 3, 4]);
        assert_eq!(even.encode_hex_prefix(true)[0] >> 4, 2);
        assert_eq!(even.encode_hex_prefix(false)[0] >> 4, 0);

        let odd = Nibbles(vec![1, 2, 3]);
        assert_eq!(odd.encode_hex_prefix(true)[0] >> 4, 3);
        assert_eq!(odd.encode_hex_prefix(false)[0] >> 4, 1);
    }

    #[test]
    fn test_hex_prefix_roundtrip() {
        for path in [Nibbles(vec![]), Nibbles(vec![7]), Nibbles(vec![1, 2, 3, 4, 5])] {
            for is_leaf in [true, false] {
                let encoded = path.encode_hex_prefix(is_leaf);
                let (decoded, leaf) =
                    Nibbles::decode_hex_prefix(&encoded).expect("hex-prefix decode");
                assert_eq!(decoded, path);
                assert_eq!(leaf, is_leaf);
            }
        }
    }

    #[test]
    fn test_common_prefix_len() {
        let a = Nibbles(vec![1, 2, 3, 4]);
        let b = Nibbles(vec![1, 2, 9]);
        assert_eq!(a.common_prefix_len(&b), 2);
        assert_eq!(a.common_prefix_len(&a), 4);
    }
}
