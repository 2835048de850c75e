//! Project version strings.

use std::fmt;
use std::str::FromStr;

use crate::codec::text::TextEncoding;
use crate::error::DecodeError;
use crate::limits::WIDE_TEXT_SINCE;

/// A `major.minor.patch[.build]` version as stored in the version event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: Option<u32>,
}

impl FlVersion {
    pub const fn new(major: u32, minor: u32, patch: u32, build: Option<u32>) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// The text encoding projects saved by this version use.
    pub fn text_encoding(&self) -> TextEncoding {
        if (self.major, self.minor) >= WIDE_TEXT_SINCE {
            TextEncoding::Wide
        } else {
            TextEncoding::Narrow
        }
    }
}

impl FromStr for FlVersion {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| DecodeError::VersionNotDetected))
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [major, minor] => Ok(Self::new(*major, *minor, 0, None)),
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch, None)),
            [major, minor, patch, build] => Ok(Self::new(*major, *minor, *patch, Some(*build))),
            _ => Err(DecodeError::VersionNotDetected),
        }
    }
}

impl fmt::Display for FlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let v: FlVersion = "20.8.4.2576".parse().unwrap();
        assert_eq!(v, FlVersion::new(20, 8, 4, Some(2576)));
        assert_eq!(v.to_string(), "20.8.4.2576");

        let v: FlVersion = "9.1".parse().unwrap();
        assert_eq!(v.to_string(), "9.1.0");

        assert!("".parse::<FlVersion>().is_err());
        assert!("20.x.1".parse::<FlVersion>().is_err());
        assert!("1.2.3.4.5".parse::<FlVersion>().is_err());
    }

    #[test]
    fn test_text_encoding_threshold() {
        assert_eq!(FlVersion::new(11, 4, 9, None).text_encoding(), TextEncoding::Narrow);
        assert_eq!(FlVersion::new(11, 5, 0, None).text_encoding(), TextEncoding::Wide);
        assert_eq!(FlVersion::new(12, 0, 0, None).text_encoding(), TextEncoding::Wide);
        assert_eq!(FlVersion::new(10, 9, 0, None).text_encoding(), TextEncoding::Narrow);
    }
}
