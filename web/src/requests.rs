//! Request bodies and their validation rules.
//!
//! Fields are optional at the serde level so that a missing field becomes a
//! `required` rule failure instead of a JSON rejection. Each field reports
//! its first failing rule only.

use crate::error::FieldError;
use serde::{Deserialize, Serialize};
use ticketing_core::CreateTicket;
use uuid::{Uuid, Variant, Version};

const REQUIRED: &str = "This field is required";
const UUID4: &str = "This field must be valid uuid4";
const GTE_ONE: &str = "This field must be greater than or equal to 1";

/// Body of `POST /tickets`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateTicketRequest {
    /// Ticket name.
    pub name: Option<String>,
    /// Ticket description.
    pub description: Option<String>,
    /// Initial allocation, at least 1.
    pub allocation: Option<i32>,
}

impl CreateTicketRequest {
    /// Check every rule and build the service input.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per invalid field, in field order.
    pub fn validate(self) -> Result<CreateTicket, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = required_text("name", self.name, &mut errors);
        let description = required_text("description", self.description, &mut errors);
        let allocation = positive("allocation", self.allocation, &mut errors);

        match (name, description, allocation) {
            (Some(name), Some(description), Some(allocation)) if errors.is_empty() => {
                Ok(CreateTicket {
                    name,
                    description,
                    allocation,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Body of `POST /tickets/{id}/purchases`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PurchaseTicketRequest {
    /// Units to buy, at least 1.
    pub quantity: Option<i32>,
    /// Purchaser, a version-4 UUID.
    pub user_id: Option<String>,
}

/// A validated purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Purchase {
    /// Units to buy.
    pub quantity: i32,
    /// Purchaser. Validated but not stored.
    pub user_id: Uuid,
}

impl PurchaseTicketRequest {
    /// Check every rule and build the validated purchase.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per invalid field, in field order.
    pub fn validate(self) -> Result<Purchase, Vec<FieldError>> {
        let mut errors = Vec::new();

        let quantity = positive("quantity", self.quantity, &mut errors);
        let user_id = uuid4("user_id", self.user_id, &mut errors);

        match (quantity, user_id) {
            (Some(quantity), Some(user_id)) if errors.is_empty() => {
                Ok(Purchase { quantity, user_id })
            }
            _ => Err(errors),
        }
    }
}

fn required_text(
    field: &str,
    value: Option<String>,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value {
        Some(text) if !text.is_empty() => Some(text),
        _ => {
            errors.push(FieldError::new(field, "required", REQUIRED));
            None
        }
    }
}

// Zero counts as missing, as with any other zero value.
fn positive(field: &str, value: Option<i32>, errors: &mut Vec<FieldError>) -> Option<i32> {
    match value {
        None | Some(0) => {
            errors.push(FieldError::new(field, "required", REQUIRED));
            None
        }
        Some(n) if n < 1 => {
            errors.push(FieldError::new(field, "gte", GTE_ONE));
            None
        }
        Some(n) => Some(n),
    }
}

fn uuid4(field: &str, value: Option<String>, errors: &mut Vec<FieldError>) -> Option<Uuid> {
    let text = required_text(field, value, errors)?;

    match Uuid::parse_str(&text) {
        Ok(id)
            if id.get_version() == Some(Version::Random)
                && id.get_variant() == Variant::RFC4122 =>
        {
            Some(id)
        }
        _ => {
            errors.push(FieldError::new(field, "uuid4", UUID4));
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    fn tags(errors: &[FieldError]) -> Vec<(&str, &str)> {
        errors
            .iter()
            .map(|e| (e.failed_field.as_str(), e.tag.as_str()))
            .collect()
    }

    #[test]
    fn valid_create_request() {
        let request = CreateTicketRequest {
            name: Some("example".into()),
            description: Some("sample description".into()),
            allocation: Some(100),
        };
        let create = request.validate().unwrap();
        assert_eq!(create.name, "example");
        assert_eq!(create.allocation, 100);
    }

    #[test]
    fn empty_create_request_lists_every_field() {
        let errors = CreateTicketRequest::default().validate().unwrap_err();
        assert_eq!(
            tags(&errors),
            [
                ("name", "required"),
                ("description", "required"),
                ("allocation", "required"),
            ]
        );
        assert!(errors.iter().all(|e| e.message == REQUIRED));
    }

    #[test]
    fn empty_strings_are_missing() {
        let request = CreateTicketRequest {
            name: Some(String::new()),
            description: Some("d".into()),
            allocation: Some(1),
        };
        assert_eq!(tags(&request.validate().unwrap_err()), [("name", "required")]);
    }

    #[test]
    fn negative_allocation_fails_gte() {
        let request = CreateTicketRequest {
            name: Some("n".into()),
            description: Some("d".into()),
            allocation: Some(-5),
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(tags(&errors), [("allocation", "gte")]);
        assert_eq!(errors[0].message, GTE_ONE);
    }

    #[test]
    fn valid_purchase_request() {
        let user_id = Uuid::new_v4();
        let request = PurchaseTicketRequest {
            quantity: Some(2),
            user_id: Some(user_id.to_string()),
        };
        assert_eq!(
            request.validate().unwrap(),
            Purchase {
                quantity: 2,
                user_id,
            }
        );
    }

    #[test]
    fn purchase_rejects_non_v4_uuid() {
        let request = PurchaseTicketRequest {
            quantity: Some(1),
            // Version 1
            user_id: Some("c232ab00-9414-11ec-b3c8-9f6bdeced846".into()),
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(tags(&errors), [("user_id", "uuid4")]);
        assert_eq!(errors[0].message, UUID4);
    }

    #[test]
    fn purchase_rejects_garbage_and_zero_quantity() {
        let request = PurchaseTicketRequest {
            quantity: Some(0),
            user_id: Some("not-a-uuid".into()),
        };
        assert_eq!(
            tags(&request.validate().unwrap_err()),
            [("quantity", "required"), ("user_id", "uuid4")]
        );
    }

    #[test]
    fn purchase_missing_user_is_required() {
        let request = PurchaseTicketRequest {
            quantity: Some(-1),
            user_id: None,
        };
        assert_eq!(
            tags(&request.validate().unwrap_err()),
            [("quantity", "gte"), ("user_id", "required")]
        );
    }
}
