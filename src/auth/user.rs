//! Authenticated identity snapshots returned by the profile endpoint.

// self
use crate::{_prelude::*, auth::UserId};

/// Account role as reported by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Shopper account.
	Buyer,
	/// Merchant account.
	Seller,
	/// Courier account.
	Delivery,
	/// Back-office account.
	Admin,
}
impl Role {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Buyer => "buyer",
			Role::Seller => "seller",
			Role::Delivery => "delivery",
			Role::Admin => "admin",
		}
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Last known authenticated identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
	/// Server identifier (`_id` on the wire).
	#[serde(rename = "_id", alias = "id")]
	pub id: UserId,
	/// Display name.
	pub name: String,
	/// Account email.
	pub email: String,
	/// Account role.
	pub role: Role,
}
impl UserSnapshot {
	/// Returns `true` when the user holds any of `roles`.
	pub fn has_any_role(&self, roles: &[Role]) -> bool {
		roles.contains(&self.role)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn snapshot_accepts_mongo_style_ids() {
		let user: UserSnapshot = serde_json::from_str(
			r#"{"_id":"65f01c","name":"Ada","email":"ada@example.com","role":"seller","status":"active"}"#,
		)
		.expect("Profile payload should deserialize.");

		assert_eq!(&*user.id, "65f01c");
		assert_eq!(user.role, Role::Seller);
		assert!(user.has_any_role(&[Role::Admin, Role::Seller]));
		assert!(!user.has_any_role(&[Role::Delivery]));

		let aliased: UserSnapshot = serde_json::from_str(
			r#"{"id":"u-2","name":"Bo","email":"bo@example.com","role":"delivery"}"#,
		)
		.expect("Plain `id` should be accepted as an alias.");

		assert_eq!(aliased.role.to_string(), "delivery");
	}
}
