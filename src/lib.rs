//! Server-side wire protocol core for the netcode 1.00 standard.
//!
//! This crate owns the byte-exact packet formats, the connect and challenge
//! token records, the AEAD framing and the replay window. It does no I/O:
//! callers hand in datagram buffers, keys and the current unix time, and get
//! back typed packets or typed errors. Everything around it (sockets, client
//! slots, key tables) lives in the connection layer.

mod crypto;
pub mod error;
pub mod packet;
pub mod replay_protection;
mod serialize;
pub mod token;

pub type ClientId = u64;

const VERSION_INFO: &[u8; 13] = b"NETCODE 1.00\0";
const VERSION_INFO_BYTES: usize = 13;

/// The maximum number of bytes that a packet can contain
const MAX_PACKET_BYTES: usize = 1220;
/// The maximum number of bytes that a payload can have when generating a payload packet
const MAX_PAYLOAD_BYTES: usize = 1200;

const KEY_BYTES: usize = 32;
const USER_DATA_BYTES: usize = 256;

const MAC_BYTES: usize = 16;
const NONCE_BYTES: usize = 8;
const CHALLENGE_TOKEN_BYTES: usize = 300;
const CONNECT_TOKEN_BYTES: usize = 2048;
const CONNECT_TOKEN_PRIVATE_BYTES: usize = 1024;

/// A connection request is a fixed-size clear envelope around the encrypted
/// private connect token.
const REQUEST_PACKET_BYTES: usize = 1 + VERSION_INFO_BYTES + 8 + 8 + 8 + CONNECT_TOKEN_PRIVATE_BYTES;

const MAX_SERVERS_PER_CONNECT: usize = 32;
const REPLAY_PROTECTION_BUFFER_SIZE: usize = 256;

const NETCODE_ADDRESS_IPV4: u8 = 1;
const NETCODE_ADDRESS_IPV6: u8 = 2;

/// Associated data for the connect token: version info, protocol id, expire timestamp.
const ADDITIONAL_DATA_SIZE: usize = VERSION_INFO_BYTES + 8 + 8;
