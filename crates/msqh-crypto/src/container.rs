//! Binary container format
//!
//! All integers are little-endian; fields follow each other without padding:
//! ```text
//! [4: "MSQH"][2: major][2: minor][2: n][2: m]
//! [C(n,m) x 32: derived keys, enumeration order]
//! [16: iv][32: head checksum][4: raw length]
//! [2: L1][2: L2][2: L3][n x 2: question lengths][4: ciphertext length]
//! [L1: hash description][L2: cipher description][L3: filename]
//! [questions, in index order][ciphertext]
//! ```
//! Every variable-length section is sized by a length field that precedes it,
//! so the decoder never scans for delimiters.

use std::io::{Read, Write};

use msqh_core::{MsqhError, MsqhResult};

use crate::cipher::padded_len;
use crate::combination::{binomial, validate_threshold};
use crate::digest::Word256;
use crate::{BLOCK_SIZE, KEY_SIZE};

/// Leading magic bytes of every container
pub const SIGNATURE: [u8; 4] = *b"MSQH";

/// Format version written by this crate
pub const FORMAT_MAJOR: u16 = 1;
pub const FORMAT_MINOR: u16 = 2;

pub const HASH_DESCRIPTION: &str = "SHA3-256";
pub const CIPHER_DESCRIPTION: &str = "AES-256";

/// A decoded container. Immutable once written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub major_version: u16,
    pub minor_version: u16,
    /// Minimum number of correct answers (`m`)
    pub threshold: u16,
    /// One key per combination, in enumeration order
    pub derived_keys: Vec<Word256>,
    pub iv: [u8; BLOCK_SIZE],
    /// Hash of the first padded plaintext block
    pub head_checksum: Word256,
    /// Plaintext length before padding
    pub raw_length: u32,
    pub hash_description: String,
    pub cipher_description: String,
    /// Original file name (descriptive; never trusted as a path)
    pub filename: String,
    pub questions: Vec<String>,
    pub ciphertext: Vec<u8>,
}

impl Container {
    /// Number of questions (`n`).
    pub fn question_count(&self) -> u16 {
        u16::try_from(self.questions.len()).unwrap_or(u16::MAX)
    }

    /// Serialize to the on-disk byte layout.
    pub fn to_bytes(&self) -> MsqhResult<Vec<u8>> {
        let n = u16::try_from(self.questions.len()).map_err(|_| {
            MsqhError::InvalidParameters(format!("too many questions: {}", self.questions.len()))
        })?;
        validate_threshold(n, self.threshold)?;
        let expected = binomial(u64::from(n), u64::from(self.threshold));
        if expected != Some(self.derived_keys.len() as u64) {
            return Err(MsqhError::InvalidParameters(format!(
                "{} derived keys stored for C({n}, {})",
                self.derived_keys.len(),
                self.threshold
            )));
        }
        let ciphertext_len = u32::try_from(self.ciphertext.len()).map_err(|_| {
            MsqhError::InvalidParameters(format!(
                "payload too large: {} bytes",
                self.ciphertext.len()
            ))
        })?;

        let strings_len: usize = self.questions.iter().map(String::len).sum::<usize>()
            + self.hash_description.len()
            + self.cipher_description.len()
            + self.filename.len();
        let mut out = Vec::with_capacity(
            12 + self.derived_keys.len() * KEY_SIZE
                + BLOCK_SIZE
                + KEY_SIZE
                + 14
                + 2 * self.questions.len()
                + strings_len
                + self.ciphertext.len(),
        );

        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&self.major_version.to_le_bytes());
        out.extend_from_slice(&self.minor_version.to_le_bytes());
        out.extend_from_slice(&n.to_le_bytes());
        out.extend_from_slice(&self.threshold.to_le_bytes());
        for key in &self.derived_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(self.head_checksum.as_bytes());
        out.extend_from_slice(&self.raw_length.to_le_bytes());

        out.extend_from_slice(&str_len("hash description", &self.hash_description)?);
        out.extend_from_slice(&str_len("cipher description", &self.cipher_description)?);
        out.extend_from_slice(&str_len("filename", &self.filename)?);
        for question in &self.questions {
            out.extend_from_slice(&str_len("question", question)?);
        }
        out.extend_from_slice(&ciphertext_len.to_le_bytes());

        out.extend_from_slice(self.hash_description.as_bytes());
        out.extend_from_slice(self.cipher_description.as_bytes());
        out.extend_from_slice(self.filename.as_bytes());
        for question in &self.questions {
            out.extend_from_slice(question.as_bytes());
        }
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> MsqhResult<()> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse a container, failing fast on a foreign signature.
    pub fn from_bytes(data: &[u8]) -> MsqhResult<Self> {
        let mut r = ByteReader::new(data);

        let signature = r.array::<4>("signature")?;
        if signature != SIGNATURE {
            return Err(MsqhError::UnsupportedFormat(format!(
                "signature {:?} is not {:?}",
                String::from_utf8_lossy(&signature),
                String::from_utf8_lossy(&SIGNATURE)
            )));
        }

        let major_version = r.u16("major version")?;
        let minor_version = r.u16("minor version")?;
        if major_version != FORMAT_MAJOR {
            tracing::warn!(major_version, minor_version, "unknown container version");
        }

        let n = r.u16("question count")?;
        let threshold = r.u16("threshold")?;
        validate_threshold(n, threshold).map_err(|e| MsqhError::Malformed(e.to_string()))?;

        let key_count = binomial(u64::from(n), u64::from(threshold))
            .and_then(|c| usize::try_from(c).ok())
            .filter(|c| c.checked_mul(KEY_SIZE).is_some_and(|len| len <= r.remaining()))
            .ok_or_else(|| {
                MsqhError::Malformed(format!(
                    "truncated derived keys: C({n}, {threshold}) keys do not fit in {} bytes",
                    r.remaining()
                ))
            })?;
        let mut derived_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            derived_keys.push(Word256::from_le_bytes(r.array("derived key")?));
        }

        let iv = r.array::<BLOCK_SIZE>("iv")?;
        let head_checksum = Word256::from_le_bytes(r.array("head checksum")?);
        let raw_length = r.u32("raw length")?;

        let hash_len = r.u16("hash description length")?;
        let cipher_len = r.u16("cipher description length")?;
        let filename_len = r.u16("filename length")?;
        let question_lens = (0..n)
            .map(|_| r.u16("question length"))
            .collect::<MsqhResult<Vec<_>>>()?;
        let ciphertext_len = r.u32("ciphertext length")? as usize;

        if ciphertext_len != padded_len(raw_length as usize) {
            return Err(MsqhError::Malformed(format!(
                "ciphertext length {ciphertext_len} does not match padded length of {raw_length} bytes"
            )));
        }

        let hash_description = r.string(hash_len.into(), "hash description")?;
        let cipher_description = r.string(cipher_len.into(), "cipher description")?;
        let filename = r.string(filename_len.into(), "filename")?;
        let questions = question_lens
            .into_iter()
            .map(|len| r.string(len.into(), "question"))
            .collect::<MsqhResult<Vec<_>>>()?;
        let ciphertext = r.take(ciphertext_len, "ciphertext")?.to_vec();

        if r.remaining() > 0 {
            tracing::warn!(trailing = r.remaining(), "ignoring bytes after ciphertext");
        }

        Ok(Self {
            major_version,
            minor_version,
            threshold,
            derived_keys,
            iv,
            head_checksum,
            raw_length,
            hash_description,
            cipher_description,
            filename,
            questions,
            ciphertext,
        })
    }

    pub fn read_from<R: Read>(mut reader: R) -> MsqhResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }
}

fn str_len(field: &str, s: &str) -> MsqhResult<[u8; 2]> {
    u16::try_from(s.len())
        .map(u16::to_le_bytes)
        .map_err(|_| MsqhError::InvalidParameters(format!("{field} too long: {} bytes", s.len())))
}

/// Bounds-checked cursor over the raw container bytes
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize, field: &str) -> MsqhResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(MsqhError::Malformed(format!(
                "truncated {field}: need {len} bytes at offset {}, {} available",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &str) -> MsqhResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u16(&mut self, field: &str) -> MsqhResult<u16> {
        Ok(u16::from_le_bytes(self.array(field)?))
    }

    fn u32(&mut self, field: &str) -> MsqhResult<u32> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn string(&mut self, len: usize, field: &str) -> MsqhResult<String> {
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| MsqhError::Malformed(format!("{field} is not UTF-8: {e}")))
    }
}
