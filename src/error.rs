use crate::token::TokenGenerationError;
use crate::{MAX_PACKET_BYTES, MAX_PAYLOAD_BYTES};
use chacha20poly1305::aead::Error as CryptoError;
use std::{error, fmt};

#[derive(Debug)]
pub enum NetcodeError {
    /// No private key was available while encrypting or decrypting.
    UnavailablePrivateKey,
    /// The type of the packet is invalid.
    InvalidPacketType,
    /// The type of the packet is not in the caller's allowed set.
    PacketTypeNotAllowed,
    /// The packet has an invalid protocol id.
    InvalidProtocolID,
    /// The packet has an invalid version.
    InvalidVersion,
    /// Packet size is too small to be a netcode packet.
    PacketTooSmall,
    /// Packet size is above the maximum datagram limit.
    PacketTooLarge,
    /// Payload is above the maximum limit.
    PayloadAboveLimit,
    /// The sequence byte count in the prefix is outside [1,8].
    InvalidSequenceBytes,
    /// The connect token has expired.
    Expired,
    /// The processed packet is duplicated.
    DuplicatedSequence,
    /// The decrypted connect token data failed structural checks.
    InvalidTokenData,
    /// An error occurred while encrypting or decrypting.
    CryptoError,
    // IO error.
    IoError(std::io::Error),
    // An error occurred while generating the connect token.
    TokenGenerationError(TokenGenerationError),
}

impl fmt::Display for NetcodeError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use NetcodeError::*;

        match *self {
            UnavailablePrivateKey => write!(fmt, "no private key was found for this address"),
            InvalidPacketType => write!(fmt, "invalid packet type"),
            PacketTypeNotAllowed => write!(fmt, "packet type is not allowed"),
            InvalidProtocolID => write!(fmt, "invalid protocol id"),
            InvalidVersion => write!(fmt, "invalid version info"),
            PacketTooSmall => write!(fmt, "packet is too small"),
            PacketTooLarge => write!(
                fmt,
                "packet is above the {} bytes limit",
                MAX_PACKET_BYTES
            ),
            PayloadAboveLimit => write!(
                fmt,
                "payload is above the {} bytes limit",
                MAX_PAYLOAD_BYTES
            ),
            InvalidSequenceBytes => write!(fmt, "sequence bytes must be between [1,8]"),
            Expired => write!(fmt, "connect token expired"),
            DuplicatedSequence => write!(fmt, "sequence already received"),
            InvalidTokenData => write!(fmt, "invalid connect token data"),
            CryptoError => write!(fmt, "error while encrypting or decrypting"),
            IoError(ref err) => write!(fmt, "{}", err),
            TokenGenerationError(ref err) => write!(fmt, "{}", err),
        }
    }
}

impl error::Error for NetcodeError {}

impl From<std::io::Error> for NetcodeError {
    fn from(inner: std::io::Error) -> Self {
        NetcodeError::IoError(inner)
    }
}

impl From<TokenGenerationError> for NetcodeError {
    fn from(inner: TokenGenerationError) -> Self {
        NetcodeError::TokenGenerationError(inner)
    }
}

impl From<CryptoError> for NetcodeError {
    fn from(_: CryptoError) -> Self {
        NetcodeError::CryptoError
    }
}
