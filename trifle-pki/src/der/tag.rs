//! ASN.1 tag octets and tag placement.

/// Constructed bit of an identifier octet
pub const CONSTRUCTED: u8 = 0x20;
/// Context-specific class bits of an identifier octet
pub const CONTEXT_SPECIFIC: u8 = 0x80;

const CONTEXT_NUMBER_MASK: u8 = 0x0F;

/// Universal tags understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Boolean = 0x01,
    Integer = 0x02,
    BitString = 0x03,
    OctetString = 0x04,
    Null = 0x05,
    ObjectIdentifier = 0x06,
    Utf8String = 0x0C,
    Sequence = 0x10,
    Set = 0x11,
    PrintableString = 0x13,
    Ia5String = 0x16,
    UtcTime = 0x17,
}

impl Tag {
    /// Universal tag number
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn is_constructed(self) -> bool {
        matches!(self, Tag::Sequence | Tag::Set)
    }

    /// Identifier octet for this tag under `context`.
    ///
    /// For `Explicit` this is the octet of the inner universal value; the
    /// outer wrapper octet comes from [`TagContext::explicit_octet`].
    pub fn octet(self, context: TagContext) -> u8 {
        let constructed = if self.is_constructed() { CONSTRUCTED } else { 0 };
        match context {
            TagContext::None | TagContext::Explicit(_) => self.number() | constructed,
            TagContext::Implicit(n) => CONTEXT_SPECIFIC | (CONTEXT_NUMBER_MASK & n) | constructed,
        }
    }

    /// Recover a universal tag from an identifier octet
    pub fn from_octet(octet: u8) -> Option<Self> {
        if octet & 0xC0 != 0 {
            return None;
        }
        let tag = match octet & 0x1F {
            0x01 => Tag::Boolean,
            0x02 => Tag::Integer,
            0x03 => Tag::BitString,
            0x04 => Tag::OctetString,
            0x05 => Tag::Null,
            0x06 => Tag::ObjectIdentifier,
            0x0C => Tag::Utf8String,
            0x10 => Tag::Sequence,
            0x11 => Tag::Set,
            0x13 => Tag::PrintableString,
            0x16 => Tag::Ia5String,
            0x17 => Tag::UtcTime,
            _ => return None,
        };
        // DER fixes the primitive/constructed form of every universal type
        if (octet & CONSTRUCTED != 0) != tag.is_constructed() {
            return None;
        }
        Some(tag)
    }
}

/// How a value's tag is placed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagContext {
    /// Universal tag
    #[default]
    None,
    /// Context-specific tag `[n]` replacing the universal tag
    Implicit(u8),
    /// Context-specific constructed tag `[n]` wrapping the universal TLV
    Explicit(u8),
}

impl TagContext {
    /// Outer identifier octet for an explicit wrapper
    pub fn explicit_octet(n: u8) -> u8 {
        CONTEXT_SPECIFIC | CONSTRUCTED | (CONTEXT_NUMBER_MASK & n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universal_octets_carry_constructed_bit() {
        assert_eq!(Tag::Sequence.octet(TagContext::None), 0x30);
        assert_eq!(Tag::Set.octet(TagContext::None), 0x31);
        assert_eq!(Tag::Integer.octet(TagContext::None), 0x02);
    }

    #[test]
    fn implicit_context_is_masked_to_four_bits() {
        assert_eq!(Tag::Set.octet(TagContext::Implicit(0)), 0xA0);
        assert_eq!(Tag::OctetString.octet(TagContext::Implicit(2)), 0x82);
        assert_eq!(Tag::OctetString.octet(TagContext::Implicit(0x12)), 0x82);
        assert_eq!(TagContext::explicit_octet(3), 0xA3);
        assert_eq!(TagContext::explicit_octet(0x13), 0xA3);
    }

    #[test]
    fn from_octet_rejects_wrong_form() {
        assert_eq!(Tag::from_octet(0x30), Some(Tag::Sequence));
        assert_eq!(Tag::from_octet(0x10), None);
        assert_eq!(Tag::from_octet(0x22), None);
        assert_eq!(Tag::from_octet(0xA0), None);
    }
}
