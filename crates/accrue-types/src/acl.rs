use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Access policy applied to an object on write.
///
/// The canned policies map to their store names; anything else is carried
/// through verbatim so stores with extra policies keep working.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
    Custom(String),
}

impl Acl {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Acl {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "private" => Self::Private,
            "public-read" => Self::PublicRead,
            "public-read-write" => Self::PublicReadWrite,
            "authenticated-read" => Self::AuthenticatedRead,
            "bucket-owner-read" => Self::BucketOwnerRead,
            "bucket-owner-full-control" => Self::BucketOwnerFullControl,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl From<&str> for Acl {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(acl) => acl,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Acl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Acl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Acl::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_private() {
        assert_eq!(Acl::default(), Acl::Private);
        assert_eq!(Acl::default().to_string(), "private");
    }

    #[test]
    fn canned_names_round_trip() {
        for name in [
            "private",
            "public-read",
            "public-read-write",
            "authenticated-read",
            "bucket-owner-read",
            "bucket-owner-full-control",
        ] {
            let acl = Acl::from(name);
            assert!(!matches!(acl, Acl::Custom(_)), "{name} should be canned");
            assert_eq!(acl.as_str(), name);
        }
    }

    #[test]
    fn unknown_policy_is_custom() {
        let acl = Acl::from("log-delivery-write");
        assert_eq!(acl, Acl::Custom("log-delivery-write".into()));
        assert_eq!(acl.as_str(), "log-delivery-write");
    }

    #[test]
    fn serde_uses_store_names() {
        let json = serde_json::to_string(&Acl::PublicRead).unwrap();
        assert_eq!(json, "\"public-read\"");
        let back: Acl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Acl::PublicRead);
    }
}
