use std::io::{self, Cursor, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use std::{error, fmt};

use crate::crypto::{decrypt_in_place, encrypt_in_place, generate_key};
use crate::error::NetcodeError;
use crate::serialize::{
    read_bytes, read_u16, read_u32, read_u64, read_u8, write_u16, write_u32, write_u64, write_u8,
};
use crate::{
    ADDITIONAL_DATA_SIZE, CONNECT_TOKEN_BYTES, CONNECT_TOKEN_PRIVATE_BYTES, KEY_BYTES, MAC_BYTES,
    MAX_SERVERS_PER_CONNECT, NETCODE_ADDRESS_IPV4, NETCODE_ADDRESS_IPV6, USER_DATA_BYTES,
    VERSION_INFO,
};

/// Public connect token, handed out-of-band to a client by the authorization
/// service. Always occupies exactly 2048 bytes on the wire; the private part
/// stays encrypted until the server decrypts it with its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectToken {
    pub version_info: [u8; 13],
    pub protocol_id: u64,
    pub create_timestamp: u64,
    pub expire_timestamp: u64,
    pub sequence: u64,
    pub private_data: [u8; CONNECT_TOKEN_PRIVATE_BYTES],
    pub timeout_seconds: u32,
    pub server_addresses: [Option<SocketAddr>; 32],
    pub client_to_server_key: [u8; KEY_BYTES],
    pub server_to_client_key: [u8; KEY_BYTES],
}

/// The private parts of a connect token. Plaintext occupies the first 1008
/// bytes of the 1024-byte record; the final 16 are the authentication tag.
#[derive(Debug, PartialEq, Eq)]
pub struct PrivateConnectToken {
    pub client_id: u64,
    pub server_addresses: [Option<SocketAddr>; 32],
    pub client_to_server_key: [u8; KEY_BYTES],
    pub server_to_client_key: [u8; KEY_BYTES],
    pub user_data: [u8; USER_DATA_BYTES],
}

#[derive(Debug)]
pub enum TokenGenerationError {
    /// A connect token must carry at least one server address.
    NoServerAddresses,
    /// A connect token is limited to 32 server addresses.
    MaxServerAddresses,
}

impl fmt::Display for TokenGenerationError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use TokenGenerationError::*;

        match *self {
            NoServerAddresses => write!(fmt, "connect token has no server addresses"),
            MaxServerAddresses => write!(
                fmt,
                "connect token has more than {} server addresses",
                MAX_SERVERS_PER_CONNECT
            ),
        }
    }
}

impl error::Error for TokenGenerationError {}

impl ConnectToken {
    /// Generates a connect token for `client_id`, minting fresh session keys
    /// and encrypting the private part with `private_key`. The caller
    /// supplies the clock as `current_time` since the unix epoch.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        current_time: Duration,
        protocol_id: u64,
        expire_seconds: u64,
        client_id: u64,
        timeout_seconds: u32,
        sequence: u64,
        server_addresses: Vec<SocketAddr>,
        user_data: Option<&[u8; USER_DATA_BYTES]>,
        private_key: &[u8; KEY_BYTES],
    ) -> Result<Self, NetcodeError> {
        let create_timestamp = current_time.as_secs();
        let expire_timestamp = create_timestamp + expire_seconds;

        let private = PrivateConnectToken::generate(client_id, server_addresses, user_data)?;

        let mut private_data = [0u8; CONNECT_TOKEN_PRIVATE_BYTES];
        private.encrypt(
            &mut private_data,
            protocol_id,
            expire_timestamp,
            sequence,
            private_key,
        )?;

        tracing::trace!("generated connect token for client {}", client_id);

        Ok(Self {
            version_info: *VERSION_INFO,
            protocol_id,
            create_timestamp,
            expire_timestamp,
            sequence,
            private_data,
            timeout_seconds,
            server_addresses: private.server_addresses,
            client_to_server_key: private.client_to_server_key,
            server_to_client_key: private.server_to_client_key,
        })
    }

    /// Writes the full 2048-byte record, zero padding included.
    pub fn write(&self, writer: &mut impl io::Write) -> Result<(), io::Error> {
        let mut buffer = [0u8; CONNECT_TOKEN_BYTES];
        let mut cursor = Cursor::new(&mut buffer[..]);

        cursor.write_all(&self.version_info)?;
        write_u64(&mut cursor, self.protocol_id)?;
        write_u64(&mut cursor, self.create_timestamp)?;
        write_u64(&mut cursor, self.expire_timestamp)?;
        write_u64(&mut cursor, self.sequence)?;
        cursor.write_all(&self.private_data)?;
        write_server_addresses(&mut cursor, &self.server_addresses)?;
        cursor.write_all(&self.client_to_server_key)?;
        cursor.write_all(&self.server_to_client_key)?;
        write_u32(&mut cursor, self.timeout_seconds)?;

        writer.write_all(&buffer)
    }

    /// Parses a connect token record. The private part remains encrypted.
    pub fn read(src: &mut impl io::Read) -> Result<Self, NetcodeError> {
        let version_info: [u8; 13] = read_bytes(src)?;
        if version_info != *VERSION_INFO {
            return Err(NetcodeError::InvalidVersion);
        }

        let protocol_id = read_u64(src)?;
        let create_timestamp = read_u64(src)?;
        let expire_timestamp = read_u64(src)?;
        if create_timestamp > expire_timestamp {
            return Err(NetcodeError::InvalidTokenData);
        }

        let sequence = read_u64(src)?;
        let private_data: [u8; CONNECT_TOKEN_PRIVATE_BYTES] = read_bytes(src)?;
        let server_addresses = read_server_addresses(src)?;
        let client_to_server_key: [u8; KEY_BYTES] = read_bytes(src)?;
        let server_to_client_key: [u8; KEY_BYTES] = read_bytes(src)?;
        let timeout_seconds = read_u32(src)?;

        Ok(Self {
            version_info,
            protocol_id,
            create_timestamp,
            expire_timestamp,
            sequence,
            private_data,
            timeout_seconds,
            server_addresses,
            client_to_server_key,
            server_to_client_key,
        })
    }
}

impl PrivateConnectToken {
    /// Mints fresh session keys and binds them to `client_id` and the server
    /// address list.
    pub fn generate(
        client_id: u64,
        server_addresses: Vec<SocketAddr>,
        user_data: Option<&[u8; USER_DATA_BYTES]>,
    ) -> Result<Self, TokenGenerationError> {
        if server_addresses.is_empty() {
            return Err(TokenGenerationError::NoServerAddresses);
        }
        if server_addresses.len() > MAX_SERVERS_PER_CONNECT {
            return Err(TokenGenerationError::MaxServerAddresses);
        }

        let mut addresses = [None; 32];
        for (index, address) in server_addresses.into_iter().enumerate() {
            addresses[index] = Some(address);
        }

        let user_data = match user_data {
            Some(data) => *data,
            None => [0u8; USER_DATA_BYTES],
        };

        Ok(Self {
            client_id,
            server_addresses: addresses,
            client_to_server_key: generate_key(),
            server_to_client_key: generate_key(),
            user_data,
        })
    }

    fn write(&self, writer: &mut impl io::Write) -> Result<(), io::Error> {
        write_u64(writer, self.client_id)?;
        write_server_addresses(writer, &self.server_addresses)?;
        writer.write_all(&self.client_to_server_key)?;
        writer.write_all(&self.server_to_client_key)?;
        writer.write_all(&self.user_data)
    }

    fn read(src: &mut impl io::Read) -> Result<Self, NetcodeError> {
        let client_id = read_u64(src)?;
        let server_addresses = read_server_addresses(src)?;
        let client_to_server_key: [u8; KEY_BYTES] = read_bytes(src)?;
        let server_to_client_key: [u8; KEY_BYTES] = read_bytes(src)?;
        let user_data: [u8; USER_DATA_BYTES] = read_bytes(src)?;

        Ok(Self {
            client_id,
            server_addresses,
            client_to_server_key,
            server_to_client_key,
            user_data,
        })
    }

    /// Serializes and seals this token into `buffer`. The whole 1024-byte
    /// record is filled: 1008 bytes of ciphertext plus the 16-byte tag.
    pub fn encrypt(
        &self,
        buffer: &mut [u8; CONNECT_TOKEN_PRIVATE_BYTES],
        protocol_id: u64,
        expire_timestamp: u64,
        sequence: u64,
        private_key: &[u8; KEY_BYTES],
    ) -> Result<(), NetcodeError> {
        buffer.fill(0);
        let mut cursor = Cursor::new(&mut buffer[..CONNECT_TOKEN_PRIVATE_BYTES - MAC_BYTES]);
        self.write(&mut cursor)?;

        let aad = get_additional_data(protocol_id, expire_timestamp);
        encrypt_in_place(buffer, sequence, private_key, &aad)
    }

    /// Opens a sealed 1024-byte record and parses the plaintext. The caller's
    /// buffer is left untouched. A failed tag check surfaces as
    /// `InvalidTokenData`, same as the structural checks.
    pub fn decrypt(
        buffer: &[u8; CONNECT_TOKEN_PRIVATE_BYTES],
        protocol_id: u64,
        expire_timestamp: u64,
        sequence: u64,
        private_key: &[u8; KEY_BYTES],
    ) -> Result<Self, NetcodeError> {
        let mut scratch = *buffer;
        let aad = get_additional_data(protocol_id, expire_timestamp);
        decrypt_in_place(&mut scratch, sequence, private_key, &aad)
            .map_err(|_| NetcodeError::InvalidTokenData)?;

        Self::read(&mut Cursor::new(
            &scratch[..CONNECT_TOKEN_PRIVATE_BYTES - MAC_BYTES],
        ))
    }
}

fn get_additional_data(protocol_id: u64, expire_timestamp: u64) -> [u8; ADDITIONAL_DATA_SIZE] {
    let mut buffer = [0u8; ADDITIONAL_DATA_SIZE];
    buffer[..13].copy_from_slice(VERSION_INFO);
    buffer[13..21].copy_from_slice(&protocol_id.to_le_bytes());
    buffer[21..29].copy_from_slice(&expire_timestamp.to_le_bytes());

    buffer
}

fn write_server_addresses(
    writer: &mut impl io::Write,
    addresses: &[Option<SocketAddr>; 32],
) -> Result<(), io::Error> {
    let num_servers = addresses.iter().flatten().count() as u32;
    write_u32(writer, num_servers)?;

    for address in addresses.iter().flatten() {
        match address {
            SocketAddr::V4(addr) => {
                write_u8(writer, NETCODE_ADDRESS_IPV4)?;
                writer.write_all(&addr.ip().octets())?;
            }
            SocketAddr::V6(addr) => {
                // The wire form carries the 16 address octets as 8
                // little-endian u16 groups.
                write_u8(writer, NETCODE_ADDRESS_IPV6)?;
                for group in addr.ip().segments() {
                    write_u16(writer, group)?;
                }
            }
        }
        write_u16(writer, address.port())?;
    }

    Ok(())
}

fn read_server_addresses(
    src: &mut impl io::Read,
) -> Result<[Option<SocketAddr>; 32], NetcodeError> {
    let num_servers = read_u32(src)? as usize;
    if num_servers == 0 || num_servers > MAX_SERVERS_PER_CONNECT {
        return Err(NetcodeError::InvalidTokenData);
    }

    let mut addresses = [None; 32];
    for slot in addresses.iter_mut().take(num_servers) {
        let family = read_u8(src)?;
        let ip = match family {
            NETCODE_ADDRESS_IPV4 => {
                let octets: [u8; 4] = read_bytes(src)?;
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            NETCODE_ADDRESS_IPV6 => {
                let mut groups = [0u16; 8];
                for group in groups.iter_mut() {
                    *group = read_u16(src)?;
                }
                IpAddr::V6(Ipv6Addr::from(groups))
            }
            _ => return Err(NetcodeError::InvalidTokenData),
        };

        let port = read_u16(src)?;
        *slot = Some(SocketAddr::new(ip, port));
    }

    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_random_bytes;

    fn server_address_list(addresses: &[SocketAddr]) -> [Option<SocketAddr>; 32] {
        let mut list = [None; 32];
        for (index, address) in addresses.iter().enumerate() {
            list[index] = Some(*address);
        }
        list
    }

    #[test]
    fn server_addresses_round_trip() {
        let addresses = server_address_list(&[
            "127.0.0.1:40000".parse().unwrap(),
            "[::1]:40000".parse().unwrap(),
            "[2001:db8::7]:26000".parse().unwrap(),
        ]);

        let mut buffer = [0u8; 256];
        write_server_addresses(&mut Cursor::new(&mut buffer[..]), &addresses).unwrap();

        let result = read_server_addresses(&mut Cursor::new(&buffer[..])).unwrap();
        assert_eq!(addresses, result);
    }

    #[test]
    fn ipv6_groups_are_little_endian_on_the_wire() {
        let addresses = server_address_list(&["[2001:db8::1]:40000".parse().unwrap()]);

        let mut buffer = [0u8; 64];
        write_server_addresses(&mut Cursor::new(&mut buffer[..]), &addresses).unwrap();

        // num_servers(4) then family(1); the first group 0x2001 must be
        // byte-swapped relative to the textual form
        assert_eq!(NETCODE_ADDRESS_IPV6, buffer[4]);
        assert_eq!([0x01, 0x20], [buffer[5], buffer[6]]);
        assert_eq!([0xb8, 0x0d], [buffer[7], buffer[8]]);
    }

    #[test]
    fn empty_server_list_is_rejected() {
        let mut buffer = [0u8; 16];
        write_u32(&mut Cursor::new(&mut buffer[..]), 0).unwrap();

        let result = read_server_addresses(&mut Cursor::new(&buffer[..]));
        assert!(matches!(result, Err(NetcodeError::InvalidTokenData)));
    }

    #[test]
    fn unknown_address_family_is_rejected() {
        let mut buffer = [0u8; 16];
        let mut cursor = Cursor::new(&mut buffer[..]);
        write_u32(&mut cursor, 1).unwrap();
        write_u8(&mut cursor, 9).unwrap();

        let result = read_server_addresses(&mut Cursor::new(&buffer[..]));
        assert!(matches!(result, Err(NetcodeError::InvalidTokenData)));
    }

    #[test]
    fn private_token_encrypt_decrypt_round_trip() {
        let private_key = generate_key();
        let user_data = generate_random_bytes();
        let token = PrivateConnectToken::generate(
            55,
            vec!["127.0.0.1:40000".parse().unwrap()],
            Some(&user_data),
        )
        .unwrap();

        let mut buffer = [0u8; CONNECT_TOKEN_PRIVATE_BYTES];
        token
            .encrypt(&mut buffer, 7, 3600, 20, &private_key)
            .unwrap();

        let result = PrivateConnectToken::decrypt(&buffer, 7, 3600, 20, &private_key).unwrap();
        assert_eq!(token, result);
    }

    #[test]
    fn tampered_private_token_fails_to_decrypt() {
        let private_key = generate_key();
        let token =
            PrivateConnectToken::generate(55, vec!["127.0.0.1:40000".parse().unwrap()], None)
                .unwrap();

        let mut buffer = [0u8; CONNECT_TOKEN_PRIVATE_BYTES];
        token
            .encrypt(&mut buffer, 7, 3600, 20, &private_key)
            .unwrap();

        buffer[100] ^= 1;
        let result = PrivateConnectToken::decrypt(&buffer, 7, 3600, 20, &private_key);
        assert!(matches!(result, Err(NetcodeError::InvalidTokenData)));
    }

    #[test]
    fn private_token_aad_binds_expire_timestamp() {
        let private_key = generate_key();
        let token =
            PrivateConnectToken::generate(55, vec!["127.0.0.1:40000".parse().unwrap()], None)
                .unwrap();

        let mut buffer = [0u8; CONNECT_TOKEN_PRIVATE_BYTES];
        token
            .encrypt(&mut buffer, 7, 3600, 20, &private_key)
            .unwrap();

        let result = PrivateConnectToken::decrypt(&buffer, 7, 3601, 20, &private_key);
        assert!(matches!(result, Err(NetcodeError::InvalidTokenData)));
    }

    #[test]
    fn rejects_empty_and_oversized_address_lists() {
        assert!(matches!(
            PrivateConnectToken::generate(1, vec![], None),
            Err(TokenGenerationError::NoServerAddresses)
        ));

        let addresses: Vec<SocketAddr> = (0..33)
            .map(|i| format!("127.0.0.1:{}", 40000 + i).parse().unwrap())
            .collect();
        assert!(matches!(
            PrivateConnectToken::generate(1, addresses, None),
            Err(TokenGenerationError::MaxServerAddresses)
        ));
    }

    #[test]
    fn connect_token_generate_write_read_decrypt() {
        let private_key = generate_key();
        let protocol_id = 0x1122_3344_5566_7788;
        let token = ConnectToken::generate(
            Duration::from_secs(100),
            protocol_id,
            30,
            42,
            15,
            1000,
            vec!["127.0.0.1:40000".parse().unwrap()],
            Some(&[0u8; USER_DATA_BYTES]),
            &private_key,
        )
        .unwrap();

        assert_eq!(100, token.create_timestamp);
        assert_eq!(130, token.expire_timestamp);

        let mut buffer = [0u8; CONNECT_TOKEN_BYTES];
        token.write(&mut Cursor::new(&mut buffer[..])).unwrap();

        let result = ConnectToken::read(&mut Cursor::new(&buffer[..])).unwrap();
        assert_eq!(token, result);

        let private = PrivateConnectToken::decrypt(
            &result.private_data,
            protocol_id,
            result.expire_timestamp,
            result.sequence,
            &private_key,
        )
        .unwrap();
        assert_eq!(42, private.client_id);
        assert_eq!([0u8; USER_DATA_BYTES], private.user_data);
        assert_eq!(
            Some("127.0.0.1:40000".parse().unwrap()),
            private.server_addresses[0]
        );
        assert_eq!(token.client_to_server_key, private.client_to_server_key);
        assert_eq!(token.server_to_client_key, private.server_to_client_key);
    }

    #[test]
    fn connect_token_write_is_exactly_2048_bytes() {
        let token = ConnectToken::generate(
            Duration::ZERO,
            7,
            300,
            1,
            15,
            0,
            vec!["127.0.0.1:40000".parse().unwrap()],
            None,
            &generate_key(),
        )
        .unwrap();

        let mut out = Vec::new();
        token.write(&mut out).unwrap();
        assert_eq!(CONNECT_TOKEN_BYTES, out.len());
    }

    #[test]
    fn connect_token_read_rejects_bad_version() {
        let token = ConnectToken::generate(
            Duration::ZERO,
            7,
            300,
            1,
            15,
            0,
            vec!["127.0.0.1:40000".parse().unwrap()],
            None,
            &generate_key(),
        )
        .unwrap();

        let mut buffer = [0u8; CONNECT_TOKEN_BYTES];
        token.write(&mut Cursor::new(&mut buffer[..])).unwrap();
        buffer[..13].copy_from_slice(b"NETCODE 0.99\0");

        let result = ConnectToken::read(&mut Cursor::new(&buffer[..]));
        assert!(matches!(result, Err(NetcodeError::InvalidVersion)));
    }

    #[test]
    fn connect_token_read_rejects_inverted_timestamps() {
        let token = ConnectToken::generate(
            Duration::from_secs(500),
            7,
            300,
            1,
            15,
            0,
            vec!["127.0.0.1:40000".parse().unwrap()],
            None,
            &generate_key(),
        )
        .unwrap();

        let mut buffer = [0u8; CONNECT_TOKEN_BYTES];
        token.write(&mut Cursor::new(&mut buffer[..])).unwrap();
        // create timestamp lives at offset 21, expire at 29
        buffer[21..29].copy_from_slice(&u64::MAX.to_le_bytes());

        let result = ConnectToken::read(&mut Cursor::new(&buffer[..]));
        assert!(matches!(result, Err(NetcodeError::InvalidTokenData)));
    }
}
