use ash::vk;
use std::fmt::{Display, Formatter};

/// A Vulkan API version without the variant bits.
///
/// Builders take and report versions through this type instead of the packed
/// `u32` encoding `vk::make_api_version` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const V1_0: Version = Version::new(1, 0, 0);
    pub const V1_1: Version = Version::new(1, 1, 0);
    pub const V1_2: Version = Version::new(1, 2, 0);
    pub const V1_3: Version = Version::new(1, 3, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decodes a packed API version. The variant field is dropped.
    pub const fn from_api_version(version: u32) -> Self {
        Self {
            major: vk::api_version_major(version),
            minor: vk::api_version_minor(version),
            patch: vk::api_version_patch(version),
        }
    }

    pub const fn to_api_version(self) -> u32 {
        vk::make_api_version(0, self.major, self.minor, self.patch)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<u32> for Version {
    fn from(version: u32) -> Self {
        Self::from_api_version(version)
    }
}

impl From<Version> for u32 {
    fn from(version: Version) -> Self {
        version.to_api_version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks() {
        let version = Version::new(1, 3, 281);
        assert_eq!(Version::from_api_version(version.to_api_version()), version);
        assert_eq!(version.to_api_version(), vk::make_api_version(0, 1, 3, 281));
    }

    #[test]
    fn drops_variant_bits() {
        let packed = vk::make_api_version(3, 1, 2, 0);
        assert_eq!(Version::from_api_version(packed), Version::V1_2);
    }

    #[test]
    fn orders_by_major_minor_patch() {
        assert!(Version::V1_0 < Version::V1_1);
        assert!(Version::V1_3 > Version::new(1, 2, 300));
        assert!(Version::new(1, 3, 1) > Version::V1_3);
    }

    #[test]
    fn displays_as_dotted_triple() {
        assert_eq!(Version::new(1, 3, 281).to_string(), "1.3.281");
    }
}
