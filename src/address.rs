use crate::LeAudioError;

/// A Bluetooth Device Address (`BD_ADDR`) wrapper for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(pub [u8; 6]);

// Logs carry the colon-separated hex form, same as `format_hex`
impl defmt::Format for DeviceAddress {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}",
            self.0[0],
            self.0[1],
            self.0[2],
            self.0[3],
            self.0[4],
            self.0[5]
        );
    }
}

impl DeviceAddress {
    /// Create a new device address from bytes
    #[must_use]
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Format the address as a colon-separated hex string
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            let hex_chars = [
                '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F',
            ];
            result.push(hex_chars[(byte >> 4) as usize]).ok();
            result.push(hex_chars[(byte & 0x0F) as usize]).ok();
        }
        result
    }

    /// Parse a device address from a colon-separated hex string
    ///
    /// # Returns
    /// - `Ok(DeviceAddress)` if the string is valid
    /// - `Err(LeAudioError::InvalidParameter)` if the string is invalid
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 17 characters long or contains invalid characters
    pub fn from_hex(hex: &str) -> Result<Self, LeAudioError> {
        if hex.len() != 17 || !hex.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
            return Err(LeAudioError::InvalidParameter);
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in hex.split(':').enumerate() {
            if i >= 6 || byte.len() != 2 {
                return Err(LeAudioError::InvalidParameter);
            }
            bytes[i] = u8::from_str_radix(byte, 16).map_err(|_| LeAudioError::InvalidParameter)?;
        }
        Ok(Self(bytes))
    }
}

impl From<[u8; 6]> for DeviceAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<DeviceAddress> for [u8; 6] {
    fn from(addr: DeviceAddress) -> Self {
        addr.0
    }
}

impl From<DeviceAddress> for heapless::String<17> {
    fn from(addr: DeviceAddress) -> Self {
        addr.format_hex()
    }
}

impl TryFrom<&str> for DeviceAddress {
    type Error = LeAudioError;

    fn try_from(hex: &str) -> Result<Self, Self::Error> {
        DeviceAddress::from_hex(hex)
    }
}

impl TryFrom<&[u8]> for DeviceAddress {
    type Error = LeAudioError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() == 6 {
            let mut addr = [0u8; 6];
            addr.copy_from_slice(bytes);
            Ok(DeviceAddress(addr))
        } else {
            Err(LeAudioError::InvalidParameter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_address_creation() {
        let addr = DeviceAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        assert_eq!(addr.as_bytes(), &[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
    }

    #[test]
    fn test_device_address_format_hex() {
        let addr = DeviceAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        assert_eq!(addr.format_hex().as_str(), "12:34:56:78:9A:BC");
    }

    #[test]
    fn test_device_address_format_hex_edge_cases() {
        let addr_zero = DeviceAddress::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(addr_zero.format_hex().as_str(), "00:00:00:00:00:00");

        let addr_max = DeviceAddress::new([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(addr_max.format_hex().as_str(), "FF:FF:FF:FF:FF:FF");

        let addr_mixed = DeviceAddress::new([0x0A, 0xB1, 0x2C, 0xD3, 0x4E, 0xF5]);
        assert_eq!(addr_mixed.format_hex().as_str(), "0A:B1:2C:D3:4E:F5");
    }

    #[test]
    fn test_device_address_conversions() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC];

        let addr: DeviceAddress = bytes.into();
        assert_eq!(addr.as_bytes(), &bytes);

        let converted_bytes: [u8; 6] = addr.into();
        assert_eq!(converted_bytes, bytes);

        let hex_str = "12:34:56:78:9A:BC";
        let addr_from_str: DeviceAddress = hex_str.try_into().unwrap();
        assert_eq!(addr_from_str.as_bytes(), &bytes);

        let hex_string: heapless::String<17> = addr.into();
        assert_eq!(hex_string.as_str(), "12:34:56:78:9A:BC");
    }

    #[test]
    fn test_device_address_from_hex_invalid() {
        assert!(DeviceAddress::from_hex("12:34:56").is_err());
        assert!(DeviceAddress::from_hex("12:34:56:78:9A:ZZ").is_err());
        assert!(DeviceAddress::from_hex("12-34-56-78-9A-BC").is_err());
    }

    #[test]
    fn test_device_address_try_from_slice() {
        let bytes = &[0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC][..];
        let addr = DeviceAddress::try_from(bytes).unwrap();
        assert_eq!(addr.as_bytes(), &[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);

        let bytes_short = &[0x12u8, 0x34, 0x56][..];
        let bytes_long = &[0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0][..];

        assert!(DeviceAddress::try_from(bytes_short).is_err());
        assert!(DeviceAddress::try_from(bytes_long).is_err());
    }
}
