use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: Uuid,
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reset_key: Option<String>,
}

impl User {
    pub fn new(id: Uuid, name: String, display_name: String, email: Option<String>) -> Self {
        Self {
            id,
            name,
            display_name,
            email,
            reset_key: None,
        }
    }
    pub fn get_id(&self) -> &Uuid {
        &self.id
    }
    pub fn get_name(&self) -> &String {
        &self.name
    }
    /// Falls back to the user name when no display name was set.
    pub fn get_display_name(&self) -> &String {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
    /// `None` when the user has no usable address, including an empty one.
    pub fn get_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.is_empty())
    }
    pub fn get_reset_key(&self) -> Option<&str> {
        self.reset_key.as_deref()
    }
    pub fn set_reset_key(&mut self, reset_key: String) {
        self.reset_key = Some(reset_key);
    }
    pub fn matches(&self, identifier: &str) -> bool {
        self.name == identifier
            || self.id.to_string() == identifier
            || self
                .get_email()
                .is_some_and(|email| email.eq_ignore_ascii_case(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_email_is_no_email() {
        let user = User::new(Uuid::new_v4(), "sam".into(), String::new(), Some(String::new()));
        assert_eq!(user.get_email(), None);
    }

    #[test]
    fn display_name_falls_back_to_name() {
        let user = User::new(Uuid::new_v4(), "sam".into(), String::new(), None);
        assert_eq!(user.get_display_name(), "sam");
        let user = User::new(Uuid::new_v4(), "sam".into(), "Sam Jones".into(), None);
        assert_eq!(user.get_display_name(), "Sam Jones");
    }

    #[test]
    fn matches_name_id_or_email() {
        let id = Uuid::new_v4();
        let user = User::new(id, "sam".into(), String::new(), Some("Sam@example.org".into()));
        assert!(user.matches("sam"));
        assert!(user.matches(&id.to_string()));
        assert!(user.matches("sam@example.org"));
        assert!(!user.matches("someone"));
    }
}
