use std::io::{self, Cursor};

use crate::crypto::{decrypt_in_place, encrypt_in_place};
use crate::error::NetcodeError;
use crate::replay_protection::ReplayProtection;
use crate::serialize::{read_bytes, read_u32, read_u64, write_u32, write_u64, write_u8};
use crate::token::{ConnectToken, PrivateConnectToken};
use crate::{
    CHALLENGE_TOKEN_BYTES, CONNECT_TOKEN_PRIVATE_BYTES, KEY_BYTES, MAC_BYTES, MAX_PACKET_BYTES,
    MAX_PAYLOAD_BYTES, REQUEST_PACKET_BYTES, USER_DATA_BYTES, VERSION_INFO, VERSION_INFO_BYTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    ConnectionRequest = 0,
    ConnectionDenied = 1,
    Challenge = 2,
    Response = 3,
    KeepAlive = 4,
    Payload = 5,
    Disconnect = 6,
}

#[derive(Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Packet<'a> {
    ConnectionRequest {
        version_info: [u8; 13], // "NETCODE 1.00" ASCII with null terminator.
        protocol_id: u64,
        expire_timestamp: u64,
        token_sequence: u64,
        token_data: [u8; CONNECT_TOKEN_PRIVATE_BYTES], // encrypted PrivateConnectToken
    },
    ConnectionDenied,
    Challenge {
        token_sequence: u64,
        token_data: [u8; CHALLENGE_TOKEN_BYTES], // encrypted ChallengeToken
    },
    Response {
        token_sequence: u64,
        token_data: [u8; CHALLENGE_TOKEN_BYTES], // encrypted ChallengeToken
    },
    KeepAlive {
        client_index: u32,
        max_clients: u32,
    },
    Payload(&'a [u8]),
    Disconnect,
}

/// Server-minted record echoed back by the client to prove it received the
/// challenge. 284 bytes of plaintext (client id, user data, zero padding)
/// sealed into a 300-byte record.
#[derive(Debug, PartialEq, Eq)]
pub struct ChallengeToken {
    pub client_id: u64,
    pub user_data: [u8; USER_DATA_BYTES],
}

/// Bit vector indexed by packet type ordinal. The connection layer narrows
/// it to the packet types that make sense for the connection's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedPackets(u8);

impl AllowedPackets {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0x7F);

    pub fn with(self, packet_type: PacketType) -> Self {
        Self(self.0 | (1 << packet_type as u8))
    }

    pub fn allows(&self, packet_type: PacketType) -> bool {
        self.0 & (1 << packet_type as u8) != 0
    }
}

impl PacketType {
    fn from_u8(value: u8) -> Result<Self, NetcodeError> {
        use PacketType::*;

        let packet_type = match value {
            0 => ConnectionRequest,
            1 => ConnectionDenied,
            2 => Challenge,
            3 => Response,
            4 => KeepAlive,
            5 => Payload,
            6 => Disconnect,
            _ => return Err(NetcodeError::InvalidPacketType),
        };
        Ok(packet_type)
    }

    fn apply_replay_protection(&self) -> bool {
        use PacketType::*;

        matches!(self, KeepAlive | Payload | Disconnect)
    }
}

impl ChallengeToken {
    pub fn new(client_id: u64, user_data: &[u8; USER_DATA_BYTES]) -> Self {
        Self {
            client_id,
            user_data: *user_data,
        }
    }

    fn write(&self, writer: &mut impl io::Write) -> Result<(), io::Error> {
        write_u64(writer, self.client_id)?;
        writer.write_all(&self.user_data)
    }

    fn read(src: &mut impl io::Read) -> Result<Self, io::Error> {
        let client_id = read_u64(src)?;
        let user_data = read_bytes(src)?;

        Ok(Self {
            client_id,
            user_data,
        })
    }

    /// Serializes and seals the token with an empty AAD and the challenge
    /// sequence as nonce.
    pub fn encode(
        &self,
        sequence: u64,
        key: &[u8; KEY_BYTES],
    ) -> Result<[u8; CHALLENGE_TOKEN_BYTES], NetcodeError> {
        let mut buffer = [0u8; CHALLENGE_TOKEN_BYTES];
        self.write(&mut Cursor::new(
            &mut buffer[..CHALLENGE_TOKEN_BYTES - MAC_BYTES],
        ))?;
        encrypt_in_place(&mut buffer, sequence, key, b"")?;

        Ok(buffer)
    }

    pub fn decode(
        mut token_data: [u8; CHALLENGE_TOKEN_BYTES],
        sequence: u64,
        key: &[u8; KEY_BYTES],
    ) -> Result<Self, NetcodeError> {
        decrypt_in_place(&mut token_data, sequence, key, b"")?;
        let token = Self::read(&mut Cursor::new(
            &token_data[..CHALLENGE_TOKEN_BYTES - MAC_BYTES],
        ))?;

        Ok(token)
    }
}

impl<'a> Packet<'a> {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::ConnectionRequest { .. } => PacketType::ConnectionRequest,
            Packet::ConnectionDenied => PacketType::ConnectionDenied,
            Packet::Challenge { .. } => PacketType::Challenge,
            Packet::Response { .. } => PacketType::Response,
            Packet::KeepAlive { .. } => PacketType::KeepAlive,
            Packet::Payload { .. } => PacketType::Payload,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    pub fn id(&self) -> u8 {
        self.packet_type() as u8
    }

    pub fn connection_request_from_token(connect_token: &ConnectToken) -> Self {
        Packet::ConnectionRequest {
            version_info: *VERSION_INFO,
            protocol_id: connect_token.protocol_id,
            expire_timestamp: connect_token.expire_timestamp,
            token_sequence: connect_token.sequence,
            token_data: connect_token.private_data,
        }
    }

    pub fn generate_challenge(
        client_id: u64,
        user_data: &[u8; USER_DATA_BYTES],
        challenge_sequence: u64,
        challenge_key: &[u8; KEY_BYTES],
    ) -> Result<Self, NetcodeError> {
        let token = ChallengeToken::new(client_id, user_data);

        Ok(Packet::Challenge {
            token_sequence: challenge_sequence,
            token_data: token.encode(challenge_sequence, challenge_key)?,
        })
    }

    fn write(&self, writer: &mut impl io::Write) -> Result<(), io::Error> {
        match self {
            Packet::ConnectionRequest {
                version_info,
                protocol_id,
                expire_timestamp,
                token_sequence,
                token_data,
            } => {
                writer.write_all(version_info)?;
                write_u64(writer, *protocol_id)?;
                write_u64(writer, *expire_timestamp)?;
                write_u64(writer, *token_sequence)?;
                writer.write_all(token_data)
            }
            Packet::Challenge {
                token_sequence,
                token_data,
            }
            | Packet::Response {
                token_sequence,
                token_data,
            } => {
                write_u64(writer, *token_sequence)?;
                writer.write_all(token_data)
            }
            Packet::KeepAlive {
                client_index,
                max_clients,
            } => {
                write_u32(writer, *client_index)?;
                write_u32(writer, *max_clients)
            }
            Packet::Payload(payload) => writer.write_all(payload),
            Packet::ConnectionDenied | Packet::Disconnect => Ok(()),
        }
    }

    fn read(packet_type: PacketType, src: &'a [u8]) -> Result<Self, NetcodeError> {
        if matches!(packet_type, PacketType::Payload) {
            return Ok(Packet::Payload(src));
        }

        let src = &mut Cursor::new(src);

        match packet_type {
            PacketType::Challenge => {
                let token_sequence = read_u64(src)?;
                let token_data = read_bytes(src)?;

                Ok(Packet::Challenge {
                    token_sequence,
                    token_data,
                })
            }
            PacketType::Response => {
                let token_sequence = read_u64(src)?;
                let token_data = read_bytes(src)?;

                Ok(Packet::Response {
                    token_sequence,
                    token_data,
                })
            }
            PacketType::KeepAlive => {
                let client_index = read_u32(src)?;
                let max_clients = read_u32(src)?;

                Ok(Packet::KeepAlive {
                    client_index,
                    max_clients,
                })
            }
            PacketType::ConnectionDenied => Ok(Packet::ConnectionDenied),
            PacketType::Disconnect => Ok(Packet::Disconnect),
            // requests are parsed inline by decode, payloads above
            PacketType::ConnectionRequest | PacketType::Payload => unreachable!(),
        }
    }

    /// Writes this packet to `buffer` and returns the number of bytes
    /// written. Requests are written in the clear; every other type needs
    /// `crypto_info` (the packet sequence and the send key) and is sealed in
    /// place.
    pub fn encode(
        &self,
        buffer: &mut [u8],
        protocol_id: u64,
        crypto_info: Option<(u64, &[u8; KEY_BYTES])>,
    ) -> Result<usize, NetcodeError> {
        if matches!(self, Packet::ConnectionRequest { .. }) {
            let mut writer = Cursor::new(buffer);
            write_u8(&mut writer, PacketType::ConnectionRequest as u8)?;
            self.write(&mut writer)?;

            Ok(writer.position() as usize)
        } else if let Some((sequence, write_key)) = crypto_info {
            if let Packet::Payload(payload) = self {
                if payload.len() > MAX_PAYLOAD_BYTES {
                    return Err(NetcodeError::PayloadAboveLimit);
                }
            }

            let (start, end, prefix_byte) = {
                let mut writer = Cursor::new(&mut *buffer);
                let prefix_byte = encode_prefix(self.id(), sequence);
                write_u8(&mut writer, prefix_byte)?;
                write_sequence(&mut writer, sequence)?;

                let start = writer.position() as usize;
                self.write(&mut writer)?;
                (start, writer.position() as usize, prefix_byte)
            };

            if end + MAC_BYTES > MAX_PACKET_BYTES {
                return Err(NetcodeError::PacketTooLarge);
            }
            if buffer.len() < end + MAC_BYTES {
                return Err(NetcodeError::IoError(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "buffer too small to encode with encryption tag",
                )));
            }

            let aad = get_additional_data(prefix_byte, protocol_id);
            encrypt_in_place(
                &mut buffer[start..end + MAC_BYTES],
                sequence,
                write_key,
                &aad,
            )?;

            Ok(end + MAC_BYTES)
        } else {
            Err(NetcodeError::UnavailablePrivateKey)
        }
    }

    /// Decodes a datagram, applying the acceptance policy in order; the
    /// first failure rejects the whole datagram. Requests are validated
    /// against the server private key and the caller's clock; every other
    /// type is opened with `read_key` and, for post-handshake types, checked
    /// against the replay window. Returns the packet sequence (0 for
    /// requests) and the typed packet; payload bytes stay borrowed from
    /// `buffer`.
    #[allow(clippy::too_many_arguments)]
    pub fn decode(
        buffer: &'a mut [u8],
        protocol_id: u64,
        current_time: u64,
        read_key: Option<&[u8; KEY_BYTES]>,
        server_private_key: Option<&[u8; KEY_BYTES]>,
        allowed_packets: AllowedPackets,
        replay_protection: Option<&mut ReplayProtection>,
    ) -> Result<(u64, Self), NetcodeError> {
        if buffer.len() < 2 + MAC_BYTES {
            return Err(NetcodeError::PacketTooSmall);
        }
        if buffer.len() > MAX_PACKET_BYTES {
            return Err(NetcodeError::PacketTooLarge);
        }

        let prefix_byte = buffer[0];
        let (packet_type, sequence_len) = decode_prefix(prefix_byte);
        let packet_type = PacketType::from_u8(packet_type)?;

        if !allowed_packets.allows(packet_type) {
            return Err(NetcodeError::PacketTypeNotAllowed);
        }

        if matches!(packet_type, PacketType::ConnectionRequest) {
            // request frames have no sequence; the prefix is exactly zero
            if sequence_len != 0 {
                return Err(NetcodeError::InvalidPacketType);
            }
            if buffer.len() != REQUEST_PACKET_BYTES {
                return Err(NetcodeError::PacketTooSmall);
            }
            let Some(private_key) = server_private_key else {
                return Err(NetcodeError::UnavailablePrivateKey);
            };

            let src = &mut Cursor::new(&buffer[1..]);
            let version_info: [u8; VERSION_INFO_BYTES] = read_bytes(src)?;
            if version_info != *VERSION_INFO {
                return Err(NetcodeError::InvalidVersion);
            }

            let token_protocol_id = read_u64(src)?;
            if token_protocol_id != protocol_id {
                return Err(NetcodeError::InvalidProtocolID);
            }

            let expire_timestamp = read_u64(src)?;
            if expire_timestamp <= current_time {
                return Err(NetcodeError::Expired);
            }

            let token_sequence = read_u64(src)?;
            let token_data: [u8; CONNECT_TOKEN_PRIVATE_BYTES] = read_bytes(src)?;

            // acceptance requires the private token to open and parse; the
            // connection layer decrypts its own copy afterwards
            PrivateConnectToken::decrypt(
                &token_data,
                protocol_id,
                expire_timestamp,
                token_sequence,
                private_key,
            )?;

            Ok((
                0,
                Packet::ConnectionRequest {
                    version_info,
                    protocol_id: token_protocol_id,
                    expire_timestamp,
                    token_sequence,
                    token_data,
                },
            ))
        } else if let Some(read_key) = read_key {
            if !(1..=8).contains(&sequence_len) {
                return Err(NetcodeError::InvalidSequenceBytes);
            }
            if buffer.len() < 1 + sequence_len + MAC_BYTES {
                return Err(NetcodeError::PacketTooSmall);
            }

            let read_pos = 1 + sequence_len;
            let sequence = read_sequence(&mut Cursor::new(&buffer[1..read_pos]), sequence_len)?;

            if let Some(ref replay_protection) = replay_protection {
                if packet_type.apply_replay_protection()
                    && replay_protection.already_received(sequence)
                {
                    tracing::debug!("ignored packet: sequence {} already received", sequence);
                    return Err(NetcodeError::DuplicatedSequence);
                }
            }

            let aad = get_additional_data(prefix_byte, protocol_id);
            decrypt_in_place(&mut buffer[read_pos..], sequence, read_key, &aad)?;

            if let Some(replay_protection) = replay_protection {
                if packet_type.apply_replay_protection() {
                    replay_protection.advance_sequence(sequence);
                }
            }

            let decrypted = &buffer[read_pos..buffer.len() - MAC_BYTES];
            match packet_type {
                PacketType::ConnectionDenied | PacketType::Disconnect => {
                    if !decrypted.is_empty() {
                        return Err(NetcodeError::CryptoError);
                    }
                }
                PacketType::Challenge | PacketType::Response => {
                    if decrypted.len() != 8 + CHALLENGE_TOKEN_BYTES {
                        return Err(NetcodeError::CryptoError);
                    }
                }
                PacketType::KeepAlive => {
                    if decrypted.len() != 8 {
                        return Err(NetcodeError::CryptoError);
                    }
                }
                PacketType::Payload => {
                    if decrypted.is_empty() {
                        return Err(NetcodeError::CryptoError);
                    }
                    if decrypted.len() > MAX_PAYLOAD_BYTES {
                        return Err(NetcodeError::PayloadAboveLimit);
                    }
                }
                PacketType::ConnectionRequest => unreachable!(),
            }

            let packet = Packet::read(packet_type, decrypted)?;
            Ok((sequence, packet))
        } else {
            Err(NetcodeError::UnavailablePrivateKey)
        }
    }
}

// The AAD binds the version, the protocol id and the prefix byte to every
// sealed packet body; this must match on both ends to decrypt.
fn get_additional_data(prefix_byte: u8, protocol_id: u64) -> [u8; VERSION_INFO_BYTES + 8 + 1] {
    let mut buffer = [0u8; VERSION_INFO_BYTES + 8 + 1];
    buffer[..13].copy_from_slice(VERSION_INFO);
    buffer[13..21].copy_from_slice(&protocol_id.to_le_bytes());
    buffer[21] = prefix_byte;

    buffer
}

/// Minimum number of bytes needed for the little-endian sequence, always in
/// [1,8].
fn sequence_bytes_required(sequence: u64) -> usize {
    let mut mask: u64 = 0xFF00_0000_0000_0000;
    for i in 0..7 {
        if sequence & mask != 0 {
            return 8 - i;
        }
        mask >>= 8;
    }

    1
}

fn encode_prefix(packet_type: u8, sequence: u64) -> u8 {
    packet_type | (sequence_bytes_required(sequence) as u8) << 4
}

fn decode_prefix(value: u8) -> (u8, usize) {
    (value & 0x0F, (value >> 4) as usize)
}

fn write_sequence(out: &mut impl io::Write, sequence: u64) -> Result<(), io::Error> {
    let len = sequence_bytes_required(sequence);
    let bytes = sequence.to_le_bytes();
    out.write_all(&bytes[..len])
}

fn read_sequence(src: &mut impl io::Read, len: usize) -> Result<u64, io::Error> {
    let mut bytes = [0u8; 8];
    src.read_exact(&mut bytes[..len])?;

    Ok(u64::from_le_bytes(bytes))
}
