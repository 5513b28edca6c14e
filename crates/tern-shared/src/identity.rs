use crc::{Crc, CRC_64_ECMA_182, CRC_8_SMBUS};

use crate::constants::{MASK_SEED, NODE_MAX_SIZE};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Deterministic 64-bit identifier for `(name, salt, domain?)`.
///
/// Bytes 0..7 are the big-endian CRC64 of the concatenated input; byte 7 is
/// then overwritten with the CRC8 of the *masked* first seven bytes. The
/// CRC8 input is masked, the stored prefix is not. The construction must
/// stay exactly this way for ids to be interchangeable across deployments
/// sharing the same salt and seed.
pub fn create_uuid(name: &str, salt: &str, domain: Option<&str>) -> u64 {
    let mut buf = Vec::with_capacity(name.len() + salt.len() + 16);
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(salt.as_bytes());
    if let Some(d) = domain {
        if !d.is_empty() {
            buf.extend_from_slice(d.as_bytes());
        }
    }
    let mut bs = CRC64.checksum(&buf).to_be_bytes();
    let masked = mask(&bs);
    bs[7] = CRC8.checksum(&masked[..7]);
    u64::from_be_bytes(bs)
}

/// A random uuid: salt plus eight random bytes fed back through
/// [`create_uuid`], so the result is self-validating like any other id.
pub fn new_random_uuid(salt: &str) -> u64 {
    let mut name = String::with_capacity(salt.len() + 16);
    name.push_str(salt);
    for b in rand::random::<u64>().to_be_bytes() {
        name.push(char::from(b'a' + (b % 26)));
    }
    create_uuid(&name, salt, None)
}

/// Recomputes the integrity byte and compares it to byte 7.
pub fn check_uuid(uuid: u64) -> bool {
    let bs = uuid.to_be_bytes();
    let masked = mask(&bs);
    CRC8.checksum(&masked[..7]) == bs[7]
}

/// Base-58 node string for a uuid.
pub fn uuid_to_node(uuid: u64) -> String {
    bs58::encode(uuid.to_be_bytes()).into_string()
}

/// Decodes a node string back to its uuid; any failure yields 0.
pub fn node_to_uuid(node: &str) -> u64 {
    match bs58::decode(node).into_vec() {
        Ok(bytes) if bytes.len() <= 8 => {
            let mut bs = [0u8; 8];
            bs[8 - bytes.len()..].copy_from_slice(&bytes);
            u64::from_be_bytes(bs)
        }
        _ => 0,
    }
}

pub fn name_to_node(name: &str, salt: &str, domain: Option<&str>) -> String {
    uuid_to_node(create_uuid(name, salt, domain))
}

/// A node string is well-formed when it satisfies the length bound and
/// round-trips through decode into a uuid that passes the integrity check.
pub fn check_node(node: &str) -> bool {
    if node.len() <= NODE_MAX_SIZE {
        let uuid = node_to_uuid(node);
        if uuid > 0 {
            return check_uuid(uuid);
        }
    }
    false
}

/// All-or-nothing over a collection of node strings; empty input fails.
pub fn check_nodes<S: AsRef<str>>(nodes: &[S]) -> bool {
    if nodes.is_empty() {
        return false;
    }
    nodes.iter().all(|n| check_node(n.as_ref()))
}

/// 16-byte chat key for a room: uuid in the first half, zeros in the second.
pub fn chat_id_by_room(node: &str, salt: &str, domain: Option<&str>) -> [u8; 16] {
    let mut r = [0u8; 16];
    r[..8].copy_from_slice(&create_uuid(node, salt, domain).to_be_bytes());
    r
}

/// Symmetric 16-byte key for a pairwise relation: the larger uuid first, so
/// `chat_id_by_node(a, b) == chat_id_by_node(b, a)`.
pub fn chat_id_by_node(from: &str, to: &str, salt: &str, domain: Option<&str>) -> [u8; 16] {
    let f = create_uuid(from, salt, domain);
    let t = create_uuid(to, salt, domain);
    unik_id(f, t)
}

/// Symmetric 16-byte key binding a group to a member.
pub fn relate_id_for_group(group: &str, user: &str, salt: &str, domain: Option<&str>) -> [u8; 16] {
    let f = create_uuid(group, salt, domain);
    let t = create_uuid(user, salt, domain);
    unik_id(f, t)
}

/// Canonically ordered 16-byte key over two raw uuids (larger first).
pub fn unik_id(f: u64, t: u64) -> [u8; 16] {
    let (f, t) = if f < t { (t, f) } else { (f, t) };
    let mut r = [0u8; 16];
    r[..8].copy_from_slice(&f.to_be_bytes());
    r[8..].copy_from_slice(&t.to_be_bytes());
    r
}

/// Directional 16-byte key: first half is always `from`, second always `to`.
/// Unlike [`chat_id_by_node`] this must NOT reorder the pair.
pub fn unik_id_by_node(from: &str, to: &str, salt: &str, domain: Option<&str>) -> [u8; 16] {
    let mut r = [0u8; 16];
    r[..8].copy_from_slice(&create_uuid(from, salt, domain).to_be_bytes());
    r[8..].copy_from_slice(&create_uuid(to, salt, domain).to_be_bytes());
    r
}

/// XOR stream under the fixed seed; an involution.
pub fn mask(bs: &[u8]) -> Vec<u8> {
    mask_with_seed(bs, &MASK_SEED)
}

/// XOR stream under a cyclically repeated seed.
pub fn mask_with_seed(bs: &[u8], seed: &[u8]) -> Vec<u8> {
    bs.iter()
        .enumerate()
        .map(|(i, b)| b ^ seed[i % seed.len()])
        .collect()
}

/// Masks an i64 through its big-endian byte representation.
pub fn mask_id(id: i64) -> i64 {
    let bs = mask(&id.to_be_bytes());
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bs);
    i64::from_be_bytes(arr)
}

fn password_bytes(uuid: u64, pwd: &str, salt: &str, domain: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + salt.len() + pwd.len() + 16);
    buf.extend_from_slice(&uuid.to_be_bytes());
    buf.extend_from_slice(salt.as_bytes());
    if let Some(d) = domain {
        buf.extend_from_slice(d.as_bytes());
    }
    buf.extend_from_slice(pwd.as_bytes());
    buf
}

/// Adaptive hash over `uuid ‖ salt ‖ domain? ‖ pwd` at the default cost.
pub fn password(
    uuid: u64,
    pwd: &str,
    salt: &str,
    domain: Option<&str>,
) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password_bytes(uuid, pwd, salt, domain), bcrypt::DEFAULT_COST)
}

pub fn check_password_hash(uuid: u64, pwd: &str, salt: &str, domain: Option<&str>, hash: &str) -> bool {
    bcrypt::verify(password_bytes(uuid, pwd, salt, domain), hash).unwrap_or(false)
}
