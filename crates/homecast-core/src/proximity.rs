//! Bluetooth proximity resolution over captured peer advertisements.
//!
//! Radio scanning and advertisement capture happen elsewhere; this module
//! only ranks what was captured and resolves rotating private addresses
//! against known long-term identity keys. Everything here is stateless:
//! each capture batch is resolved from scratch, with no carry-over.

use aes::Aes128;
use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use tracing::trace;

use homecast_types::BluetoothPeer;

/// A 128-bit long-term identity key for a peer that advertises under
/// rotating private addresses.
pub type IdentityKey = [u8; 16];

/// Rank captured peers by signal strength, strongest first.
/// Ties keep capture order.
#[must_use]
pub fn rank_by_signal(peers: &[BluetoothPeer]) -> Vec<BluetoothPeer> {
    let mut ranked = peers.to_vec();
    ranked.sort_by_key(|peer| std::cmp::Reverse(peer.rssi));
    ranked
}

/// The single closest peer: strongest signal, first-captured on ties.
#[must_use]
pub fn closest_peer(peers: &[BluetoothPeer]) -> Option<&BluetoothPeer> {
    peers
        .iter()
        .reduce(|best, peer| if peer.rssi > best.rssi { peer } else { best })
}

/// Whether a captured address is the current rotation of the peer holding
/// this identity key.
///
/// Resolvable private addresses carry a 24-bit random part and a 24-bit
/// hash of that random part under the identity key. The address matches
/// when recomputing the hash with the key reproduces the transmitted
/// hash. Addresses that are not in resolvable-private form (wrong type
/// bits, unparseable) never match.
///
/// Pure function: nothing is retained between calls.
#[must_use]
pub fn address_matches_key(key: &IdentityKey, mac_address: &str) -> bool {
    let Some(bytes) = parse_mac(mac_address) else {
        trace!(%mac_address, "Address is not parseable, skipping");
        return false;
    };

    // Resolvable private addresses have 0b01 in the two most significant
    // bits of the random part.
    if bytes[0] & 0xC0 != 0x40 {
        return false;
    }

    let prand = [bytes[0], bytes[1], bytes[2]];
    let hash = [bytes[3], bytes[4], bytes[5]];
    resolvable_hash(key, prand) == hash
}

/// Resolve which captured peer currently corresponds to an identity key.
///
/// Returns the first match in capture order, or `None` when the peer is
/// not visible in this batch.
#[must_use]
pub fn resolve_peer<'a>(key: &IdentityKey, peers: &'a [BluetoothPeer]) -> Option<&'a BluetoothPeer> {
    peers
        .iter()
        .find(|peer| address_matches_key(key, &peer.mac_address))
}

/// The 24-bit address hash: AES-128 of the zero-padded random part under
/// the identity key, truncated to its low 24 bits.
fn resolvable_hash(key: &IdentityKey, prand: [u8; 3]) -> [u8; 3] {
    let mut block = [0u8; 16];
    block[13..16].copy_from_slice(&prand);

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut block = GenericArray::from(block);
    cipher.encrypt_block(&mut block);

    [block[13], block[14], block[15]]
}

/// Parse a colon-separated hardware address into its six octets.
fn parse_mac(mac_address: &str) -> Option<[u8; 6]> {
    let mut bytes = [0u8; 6];
    let mut parts = mac_address.split(':');
    for byte in &mut bytes {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(bytes)
}
