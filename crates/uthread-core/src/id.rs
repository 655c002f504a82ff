//! Green thread identifier type

use core::fmt;

/// Identifier of a green thread within one runtime
///
/// This is a 32-bit index into the runtime's thread arena. Slot 0 is always
/// the main thread (the OS thread's original context). `u32::MAX` is reserved
/// as the "no thread" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct GreenId(u32);

impl GreenId {
    /// Sentinel value meaning "no thread"
    pub const NONE: GreenId = GreenId(u32::MAX);

    /// The implicit main thread, present from initialization onwards
    pub const MAIN: GreenId = GreenId(0);

    #[inline]
    pub const fn new(id: u32) -> Self {
        GreenId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Index into the thread arena
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub const fn is_main(self) -> bool {
        self.0 == 0
    }

    /// Convert to Option, mapping the sentinel to `None`
    #[inline]
    pub const fn to_option(self) -> Option<GreenId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for GreenId {
    #[inline]
    fn from(id: u32) -> Self {
        GreenId(id)
    }
}

impl From<GreenId> for u32 {
    #[inline]
    fn from(id: GreenId) -> Self {
        id.0
    }
}

impl fmt::Debug for GreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "GreenId(NONE)")
        } else {
            write!(f, "GreenId({})", self.0)
        }
    }
}

impl fmt::Display for GreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "g{}", self.0)
        }
    }
}

impl Default for GreenId {
    fn default() -> Self {
        GreenId::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_and_none() {
        assert!(GreenId::MAIN.is_main());
        assert!(!GreenId::MAIN.is_none());
        assert!(GreenId::NONE.is_none());
        assert_eq!(GreenId::NONE.to_option(), None);
        assert_eq!(GreenId::new(3).to_option(), Some(GreenId::new(3)));
        assert_eq!(GreenId::default(), GreenId::NONE);
    }

    #[test]
    fn test_display() {
        assert_eq!(GreenId::MAIN.to_string(), "main");
        assert_eq!(GreenId::new(7).to_string(), "g7");
        assert_eq!(GreenId::NONE.to_string(), "none");
        assert_eq!(format!("{:?}", GreenId::new(2)), "GreenId(2)");
    }
}
