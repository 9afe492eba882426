//! Little-endian read/write helpers over byte cursors. Reads assign into
//! fresh outputs and fail with `UnexpectedEof` when the source runs dry;
//! writes into fixed buffers fail with `WriteZero`.

use std::io;

pub fn read_u8(src: &mut impl io::Read) -> Result<u8, io::Error> {
    let mut buffer = [0u8; 1];
    src.read_exact(&mut buffer)?;
    Ok(buffer[0])
}

pub fn read_u16(src: &mut impl io::Read) -> Result<u16, io::Error> {
    let mut buffer = [0u8; 2];
    src.read_exact(&mut buffer)?;
    Ok(u16::from_le_bytes(buffer))
}

pub fn read_u32(src: &mut impl io::Read) -> Result<u32, io::Error> {
    let mut buffer = [0u8; 4];
    src.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

pub fn read_u64(src: &mut impl io::Read) -> Result<u64, io::Error> {
    let mut buffer = [0u8; 8];
    src.read_exact(&mut buffer)?;
    Ok(u64::from_le_bytes(buffer))
}

pub fn read_i8(src: &mut impl io::Read) -> Result<i8, io::Error> {
    let mut buffer = [0u8; 1];
    src.read_exact(&mut buffer)?;
    Ok(i8::from_le_bytes(buffer))
}

pub fn read_i16(src: &mut impl io::Read) -> Result<i16, io::Error> {
    let mut buffer = [0u8; 2];
    src.read_exact(&mut buffer)?;
    Ok(i16::from_le_bytes(buffer))
}

pub fn read_i32(src: &mut impl io::Read) -> Result<i32, io::Error> {
    let mut buffer = [0u8; 4];
    src.read_exact(&mut buffer)?;
    Ok(i32::from_le_bytes(buffer))
}

pub fn read_i64(src: &mut impl io::Read) -> Result<i64, io::Error> {
    let mut buffer = [0u8; 8];
    src.read_exact(&mut buffer)?;
    Ok(i64::from_le_bytes(buffer))
}

pub fn read_bytes<const N: usize>(src: &mut impl io::Read) -> Result<[u8; N], io::Error> {
    let mut data = [0u8; N];
    src.read_exact(&mut data)?;
    Ok(data)
}

pub fn write_u8(out: &mut impl io::Write, value: u8) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_u16(out: &mut impl io::Write, value: u16) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_u32(out: &mut impl io::Write, value: u32) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_u64(out: &mut impl io::Write, value: u64) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_i8(out: &mut impl io::Write, value: i8) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_i16(out: &mut impl io::Write, value: i16) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_i32(out: &mut impl io::Write, value: i32) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

pub fn write_i64(out: &mut impl io::Write, value: i64) -> Result<(), io::Error> {
    out.write_all(&value.to_le_bytes())
}

/// Writes `bytes` truncated or zero-padded to exactly `len` bytes.
pub fn write_bytes_n(out: &mut impl io::Write, bytes: &[u8], len: usize) -> Result<(), io::Error> {
    if bytes.len() >= len {
        return out.write_all(&bytes[..len]);
    }

    out.write_all(bytes)?;
    for _ in bytes.len()..len {
        out.write_all(&[0u8])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn unsigned_round_trip() {
        let mut buffer = [0u8; 15];
        let mut writer = Cursor::new(&mut buffer[..]);
        write_u8(&mut writer, 0xA5).unwrap();
        write_u16(&mut writer, 0xBEEF).unwrap();
        write_u32(&mut writer, 0xDEAD_BEEF).unwrap();
        write_u64(&mut writer, 0x0102_0304_0506_0708).unwrap();

        let mut src = Cursor::new(&buffer[..]);
        assert_eq!(0xA5, read_u8(&mut src).unwrap());
        assert_eq!(0xBEEF, read_u16(&mut src).unwrap());
        assert_eq!(0xDEAD_BEEF, read_u32(&mut src).unwrap());
        assert_eq!(0x0102_0304_0506_0708, read_u64(&mut src).unwrap());
    }

    #[test]
    fn signed_round_trip() {
        let mut buffer = [0u8; 15];
        let mut writer = Cursor::new(&mut buffer[..]);
        write_i8(&mut writer, -5).unwrap();
        write_i16(&mut writer, -30000).unwrap();
        write_i32(&mut writer, -2_000_000_000).unwrap();
        write_i64(&mut writer, i64::MIN).unwrap();

        let mut src = Cursor::new(&buffer[..]);
        assert_eq!(-5, read_i8(&mut src).unwrap());
        assert_eq!(-30000, read_i16(&mut src).unwrap());
        assert_eq!(-2_000_000_000, read_i32(&mut src).unwrap());
        assert_eq!(i64::MIN, read_i64(&mut src).unwrap());
    }

    #[test]
    fn little_endian_on_the_wire() {
        let mut buffer = [0u8; 4];
        write_u32(&mut Cursor::new(&mut buffer[..]), 0x0102_0304).unwrap();
        assert_eq!([0x04, 0x03, 0x02, 0x01], buffer);
    }

    #[test]
    fn read_past_end_fails() {
        let buffer = [0u8; 3];
        let mut src = Cursor::new(&buffer[..]);
        let err = read_u32(&mut src).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
    }

    #[test]
    fn write_past_end_fails() {
        let mut buffer = [0u8; 3];
        let mut writer = Cursor::new(&mut buffer[..]);
        let err = write_u64(&mut writer, 1).unwrap_err();
        assert_eq!(io::ErrorKind::WriteZero, err.kind());
    }

    #[test]
    fn write_bytes_n_pads_with_zeros() {
        let mut buffer = [0xFFu8; 6];
        write_bytes_n(&mut Cursor::new(&mut buffer[..]), &[1, 2, 3], 5).unwrap();
        assert_eq!([1, 2, 3, 0, 0, 0xFF], buffer);
    }

    #[test]
    fn read_bytes_consumes_exact_width() {
        let buffer = [9u8; 8];
        let mut src = Cursor::new(&buffer[..]);
        let data: [u8; 5] = read_bytes(&mut src).unwrap();
        assert_eq!([9u8; 5], data);
        assert_eq!(5, src.position() as usize);
    }
}
