//! Distributable artifacts.
//!
//! An artifact is a single-file info dictionary: name, total length, piece
//! length, and the concatenated SHA-256 digests of each piece. Its info hash
//! is the SHA-256 of the canonical bencoding of that dictionary.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use magnetcast_common::{Error, Result};
use sha2::{Digest, Sha256};

use crate::bencode::Value;

/// Default piece length (256 KiB).
pub const DEFAULT_PIECE_LENGTH: u64 = 256 * 1024;

const DIGEST_LEN: usize = 32;

// ---------------------------------------------------------------------------
// InfoHash
// ---------------------------------------------------------------------------

/// SHA-256 digest of an artifact's info dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; DIGEST_LEN]);

impl InfoHash {
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hash raw bencoded info bytes.
    pub fn of_info(encoded: &[u8]) -> Self {
        Self(Sha256::digest(encoded).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::InvalidIdentifier(format!("info hash {s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// ArtifactInfo
// ---------------------------------------------------------------------------

/// The info dictionary of a single-file artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub name: String,
    pub length: u64,
    pub piece_length: u64,
    pub pieces: Vec<[u8; DIGEST_LEN]>,
}

impl ArtifactInfo {
    /// Hash `data` into pieces of `piece_length` bytes.
    pub fn from_bytes(name: impl Into<String>, data: &[u8], piece_length: u64) -> Self {
        let chunk = piece_length.max(1) as usize;
        let pieces: Vec<[u8; DIGEST_LEN]> = data
            .chunks(chunk)
            .map(|piece| Sha256::digest(piece).into())
            .collect();
        Self {
            name: name.into(),
            length: data.len() as u64,
            piece_length: piece_length.max(1),
            pieces,
        }
    }

    /// Hash a file from disk without loading it whole. Blocking.
    pub fn from_file(path: &Path, piece_length: u64) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::artifact(path, "path has no usable file name"))?
            .to_string();

        let mut file = std::fs::File::open(path).map_err(|e| Error::artifact(path, e))?;
        let piece_length = piece_length.max(1);
        let mut buf = vec![0u8; piece_length as usize];
        let mut pieces: Vec<[u8; DIGEST_LEN]> = Vec::new();
        let mut length = 0u64;

        loop {
            let filled = read_full(&mut file, &mut buf).map_err(|e| Error::artifact(path, e))?;
            if filled == 0 {
                break;
            }
            pieces.push(Sha256::digest(&buf[..filled]).into());
            length += filled as u64;
            if filled < buf.len() {
                break;
            }
        }

        if length == 0 {
            return Err(Error::artifact(path, "segment file is empty"));
        }

        Ok(Self {
            name,
            length,
            piece_length,
            pieces,
        })
    }

    /// Canonical bencoding of the info dictionary.
    pub fn encode(&self) -> Vec<u8> {
        let mut dict = BTreeMap::new();
        dict.insert(b"length".to_vec(), Value::Int(self.length as i64));
        dict.insert(b"name".to_vec(), Value::bytes(self.name.as_bytes()));
        dict.insert(b"piece length".to_vec(), Value::Int(self.piece_length as i64));
        dict.insert(b"pieces".to_vec(), Value::Bytes(self.pieces.concat()));
        Value::Dict(dict).encode()
    }

    /// Parse a bencoded info dictionary.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let invalid = |msg: &str| Error::InvalidIdentifier(format!("info dictionary: {msg}"));

        let value = Value::decode(encoded).map_err(|e| invalid(&e.to_string()))?;
        let dict = value.as_dict().ok_or_else(|| invalid("not a dictionary"))?;

        let length = dict
            .get(b"length".as_slice())
            .and_then(Value::as_int)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| invalid("missing length"))?;
        let piece_length = dict
            .get(b"piece length".as_slice())
            .and_then(Value::as_int)
            .and_then(|n| u64::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| invalid("missing piece length"))?;
        let name = dict
            .get(b"name".as_slice())
            .and_then(Value::as_bytes)
            .and_then(|b| std::str::from_utf8(b).ok())
            .ok_or_else(|| invalid("missing name"))?
            .to_string();
        let raw_pieces = dict
            .get(b"pieces".as_slice())
            .and_then(Value::as_bytes)
            .ok_or_else(|| invalid("missing pieces"))?;

        if raw_pieces.len() % DIGEST_LEN != 0 {
            return Err(invalid("pieces length is not a multiple of the digest size"));
        }
        let pieces: Vec<[u8; DIGEST_LEN]> = raw_pieces
            .chunks_exact(DIGEST_LEN)
            .map(|c| {
                let mut digest = [0u8; DIGEST_LEN];
                digest.copy_from_slice(c);
                digest
            })
            .collect();

        if pieces.len() as u64 != length.div_ceil(piece_length) {
            return Err(invalid("piece count does not match length"));
        }

        Ok(Self {
            name,
            length,
            piece_length,
            pieces,
        })
    }

    pub fn info_hash(&self) -> InfoHash {
        InfoHash::of_info(&self.encode())
    }

    /// Check a payload against the declared length and every piece hash.
    pub fn verify(&self, data: &[u8]) -> std::result::Result<(), String> {
        if data.len() as u64 != self.length {
            return Err(format!(
                "length mismatch: expected {} bytes, got {}",
                self.length,
                data.len()
            ));
        }
        for (index, (piece, expected)) in data
            .chunks(self.piece_length as usize)
            .zip(&self.pieces)
            .enumerate()
        {
            let actual: [u8; DIGEST_LEN] = Sha256::digest(piece).into();
            if &actual != expected {
                return Err(format!("piece {index} failed hash check"));
            }
        }
        Ok(())
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// A built artifact together with the file it describes.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub info: ArtifactInfo,
    pub info_hash: InfoHash,
    pub source: PathBuf,
}

impl Artifact {
    pub fn new(info: ArtifactInfo, source: PathBuf) -> Self {
        let info_hash = info.info_hash();
        Self {
            info,
            info_hash,
            source,
        }
    }

    /// Build an artifact for the file at `path`. Blocking.
    pub fn build(path: &Path, piece_length: u64) -> Result<Self> {
        let info = ArtifactInfo::from_file(path, piece_length)?;
        Ok(Self::new(info, path.to_path_buf()))
    }
}
