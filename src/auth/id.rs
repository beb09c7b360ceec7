//! Strongly typed identifiers for credential identities and advertising accounts.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $normalize:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after normalization and validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				$normalize($kind, value.as_ref()).map(Self)
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const DEFAULT_IDENTITY: &str = "default";

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (credential, account).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (credential, account).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (credential, account).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The identifier contains characters outside the permitted alphabet.
	#[error("{kind} identifier must contain only digits and dashes.")]
	NotNumeric {
		/// Kind of identifier (credential, account).
		kind: &'static str,
	},
}

def_id! { CredentialId, "Identity a token is cached and refreshed under.", "Credential", normalize_opaque }
def_id! {
	AccountId,
	"Advertising account number, stored without dashes (`123-456-7890` becomes `1234567890`).",
	"Account",
	normalize_account
}

impl CredentialId {
	/// Returns the identity used when callers never name one.
	pub fn default_identity() -> Self {
		Self(DEFAULT_IDENTITY.to_owned())
	}
}
impl Default for CredentialId {
	fn default() -> Self {
		Self::default_identity()
	}
}

fn normalize_opaque(kind: &'static str, view: &str) -> Result<String, IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(view.to_owned())
}

fn normalize_account(kind: &'static str, view: &str) -> Result<String, IdentifierError> {
	let view = view.trim();

	if view.chars().any(|c| !(c.is_ascii_digit() || c == '-')) {
		return Err(IdentifierError::NotNumeric { kind });
	}

	normalize_opaque(kind, &view.replace('-', ""))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credential_ids_validate() {
		assert!(CredentialId::new(" primary").is_err(), "Leading whitespace must be rejected.");
		assert!(CredentialId::new("").is_err());

		let id = CredentialId::new("primary").expect("Credential fixture should be valid.");

		assert_eq!(id.as_ref(), "primary");
		assert_eq!(CredentialId::default().as_ref(), DEFAULT_IDENTITY);
	}

	#[test]
	fn account_ids_strip_dashes() {
		let account =
			AccountId::new("123-456-7890").expect("Dashed account number should be accepted.");

		assert_eq!(account.as_ref(), "1234567890");
		assert!(AccountId::new("12a4").is_err());
		assert!(AccountId::new("---").is_err(), "Dashes alone leave an empty identifier.");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let account: AccountId = serde_json::from_str("\"111-222-3333\"")
			.expect("Account should deserialize successfully.");

		assert_eq!(account.as_ref(), "1112223333");
		assert_eq!(
			serde_json::to_string(&account).expect("Account should serialize."),
			"\"1112223333\""
		);
		assert!(serde_json::from_str::<CredentialId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limits_and_borrowed_lookup() {
		CredentialId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(CredentialId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());

		let map: HashMap<CredentialId, u8> = HashMap::from_iter([(
			CredentialId::new("primary").expect("Credential used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("primary"), Some(&7));
	}
}
