//! Typed group and stream records.
//!
//! Group membership and descriptions can only grow through this API: there
//! is no setter that replaces a non-empty description or drops a member.

use showsetup_config::{Relation, StreamType};

/// Result of saving a group or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
}

impl WriteOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, WriteOutcome::Created)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupObject {
    name: String,
    description: String,
    owners: Vec<String>,
    users: Vec<String>,
    subgroups: Vec<String>,
}

impl GroupObject {
    /// A group with no description and no members.
    pub fn blank(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A group as stored on the server.
    pub fn existing(
        name: impl Into<String>,
        description: impl Into<String>,
        owners: Vec<String>,
        users: Vec<String>,
        subgroups: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            owners,
            users,
            subgroups,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn members(&self, relation: Relation) -> &[String] {
        match relation {
            Relation::Owners => &self.owners,
            Relation::Users => &self.users,
            Relation::Subgroups => &self.subgroups,
        }
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Whether the group has neither a description nor members.
    pub fn is_blank(&self) -> bool {
        self.description.trim().is_empty()
            && self.owners.is_empty()
            && self.users.is_empty()
            && self.subgroups.is_empty()
    }

    /// Set the description unless one is already present. Returns whether
    /// it was set.
    pub fn describe_if_empty(&mut self, description: impl Into<String>) -> bool {
        if !self.description.trim().is_empty() {
            return false;
        }
        self.description = description.into();
        true
    }

    /// Append `member` under `relation` unless it is already listed (exact
    /// match). Returns whether it was added.
    pub fn add_member(&mut self, relation: Relation, member: &str) -> bool {
        let list = match relation {
            Relation::Owners => &mut self.owners,
            Relation::Users => &mut self.users,
            Relation::Subgroups => &mut self.subgroups,
        };
        if list.iter().any(|existing| existing == member) {
            return false;
        }
        list.push(member.to_string());
        true
    }
}

/// A stream spec. Fields are optional so a blank stream can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamObject {
    pub name: String,
    pub stream_type: Option<StreamType>,
    pub parent: Option<String>,
    pub description: String,
}

impl StreamObject {
    pub fn blank(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream_type: None,
            parent: None,
            description: String::new(),
        }
    }
}
