//! Gateway backed by the `p4` command line client.

use once_cell::sync::Lazy;
use regex::Regex;
use showsetup_config::{Relation, StreamType};
use tracing::{debug, info};

use crate::command::{ConnectionSettings, P4Command};
use crate::form::SpecForm;
use crate::objects::{GroupObject, StreamObject, WriteOutcome};
use crate::{ops, Backend, BackendFault, Result};

/// `p4 group -i` confirmation for a new group.
static GROUP_CREATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^Group \S+ created\.?\s*$")
        .expect("group created regex should compile - this is a static pattern")
});

const PROTECTIONS: &str = "Protections";
const DESCRIPTION: &str = "Description";

const GROUP_FIELDS: [(Relation, &str); 3] = [
    (Relation::Owners, "Owners"),
    (Relation::Users, "Users"),
    (Relation::Subgroups, "Subgroups"),
];

#[derive(Debug, Clone)]
pub struct P4Backend {
    settings: ConnectionSettings,
}

impl P4Backend {
    /// Fails if the `p4` executable cannot be found.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        which::which(&settings.binary).map_err(|e| {
            BackendFault::new(
                ops::CONNECT,
                format!("{} executable not found: {}", settings.binary, e),
            )
        })?;
        Ok(Self { settings })
    }

    fn p4(&self, subcommand: &str) -> P4Command<'_> {
        P4Command::new(&self.settings, subcommand)
    }

    fn group_form(&self, name: &str, operation: &str) -> Result<SpecForm> {
        let out = self.p4("group").args(["-o", name]).run(operation)?;
        Ok(SpecForm::parse(&out))
    }

    fn stream_form(&self, name: &str, stream_type: Option<StreamType>, operation: &str) -> Result<SpecForm> {
        let mut command = self.p4("stream").arg("-o");
        if let Some(stream_type) = stream_type {
            command = command.args(["-t", stream_type.as_str()]);
        }
        let out = command.arg(name).run(operation)?;
        Ok(SpecForm::parse(&out))
    }
}

/// Whether `p4 group -i` output reports a new group.
fn group_was_created(output: &str) -> bool {
    GROUP_CREATED.is_match(output)
}

/// Stream specs only carry an `Update` date once they have been saved.
fn stream_form_exists(form: &SpecForm) -> bool {
    form.contains("Update")
}

fn parent_field(parent: Option<&str>) -> &str {
    parent.unwrap_or("none")
}

impl Backend for P4Backend {
    fn name(&self) -> &'static str {
        "p4"
    }

    fn create_namespace(&self, name: &str) -> Result<()> {
        let out = self
            .p4("depot")
            .args(["-o", "-t", "stream", name])
            .run(ops::CREATE_NAMESPACE)?;
        let mut form = SpecForm::parse(&out);
        form.set_value("Type", "stream");
        let out = self
            .p4("depot")
            .arg("-i")
            .input(form.render())
            .run(ops::CREATE_NAMESPACE)?;
        info!("{}", out.trim());
        Ok(())
    }

    fn namespace_exists(&self, name: &str) -> Result<bool> {
        let out = self
            .p4("depots")
            .args(["-E", name])
            .run(ops::NAMESPACE_EXISTS)?;
        Ok(out.lines().any(|line| {
            line.split_whitespace()
                .nth(1)
                .is_some_and(|depot| depot.eq_ignore_ascii_case(name))
        }))
    }

    fn read_protection_table(&self) -> Result<Vec<String>> {
        let out = self.p4("protect").arg("-o").run(ops::READ_PROTECTION_TABLE)?;
        Ok(SpecForm::parse(&out).lines(PROTECTIONS).to_vec())
    }

    fn write_protection_table(&self, lines: &[String]) -> Result<()> {
        let out = self.p4("protect").arg("-o").run(ops::WRITE_PROTECTION_TABLE)?;
        let mut form = SpecForm::parse(&out);
        form.set_lines(PROTECTIONS, lines.iter().cloned());
        let out = self
            .p4("protect")
            .arg("-i")
            .input(form.render())
            .run(ops::WRITE_PROTECTION_TABLE)?;
        debug!("{}", out.trim());
        Ok(())
    }

    fn read_group(&self, name: &str) -> Result<GroupObject> {
        let form = self.group_form(name, ops::READ_GROUP)?;
        let [owners, users, subgroups] =
            GROUP_FIELDS.map(|(_, field)| form.lines(field).to_vec());
        Ok(GroupObject::existing(
            name,
            form.text(DESCRIPTION),
            owners,
            users,
            subgroups,
        ))
    }

    fn write_group(&self, group: &GroupObject) -> Result<WriteOutcome> {
        let mut form = self.group_form(group.name(), ops::WRITE_GROUP)?;
        form.set_text(DESCRIPTION, group.description());
        for (relation, field) in GROUP_FIELDS {
            let members = group.members(relation);
            if members.is_empty() {
                form.remove(field);
            } else {
                form.set_lines(field, members.iter().cloned());
            }
        }

        let out = self
            .p4("group")
            .arg("-i")
            .input(form.render())
            .run(ops::WRITE_GROUP)?;
        info!("{}", out.trim());
        Ok(if group_was_created(&out) {
            WriteOutcome::Created
        } else {
            WriteOutcome::Updated
        })
    }

    fn read_stream(&self, name: &str) -> Result<StreamObject> {
        let form = self.stream_form(name, None, ops::READ_STREAM)?;
        if !stream_form_exists(&form) {
            return Ok(StreamObject::blank(name));
        }
        Ok(StreamObject {
            name: name.to_string(),
            stream_type: form.value("Type").and_then(|t| t.parse().ok()),
            parent: form
                .value("Parent")
                .filter(|parent| *parent != "none")
                .map(str::to_string),
            description: form.text(DESCRIPTION),
        })
    }

    fn write_stream(&self, stream: &StreamObject) -> Result<WriteOutcome> {
        let mut form = self.stream_form(&stream.name, stream.stream_type, ops::WRITE_STREAM)?;
        let existed = stream_form_exists(&form);

        if let Some(stream_type) = stream.stream_type {
            form.set_value("Type", stream_type.as_str());
        }
        form.set_value("Parent", parent_field(stream.parent.as_deref()));
        form.set_text(DESCRIPTION, &stream.description);

        let out = self
            .p4("stream")
            .arg("-i")
            .input(form.render())
            .run(ops::WRITE_STREAM)?;
        info!("{}", out.trim());
        Ok(if existed {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Created
        })
    }

    fn bulk_copy(&self, source: &str, target: &str) -> Result<()> {
        let out = self
            .p4("populate")
            .args([source, target])
            .run(ops::BULK_COPY)?;
        debug!("{}", out.trim());
        Ok(())
    }

    fn delete_namespace(&self, name: &str) -> Result<()> {
        let out = self.p4("depot").args(["-d", name]).run(ops::DELETE_NAMESPACE)?;
        info!("{}", out.trim());
        Ok(())
    }

    fn bulk_delete(&self, pattern: &str) -> Result<()> {
        let out = self
            .p4("obliterate")
            .args(["-y", pattern])
            .run(ops::BULK_DELETE)?;
        debug!("{}", out.trim());
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        let out = self.p4("group").args(["-d", name]).run(ops::DELETE_GROUP)?;
        info!("{}", out.trim());
        Ok(())
    }

    fn delete_stream(&self, name: &str) -> Result<()> {
        let out = self.p4("stream").args(["-d", name]).run(ops::DELETE_STREAM)?;
        info!("{}", out.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_was_created() {
        assert!(group_was_created("Group FOO-External created.\n"));
        assert!(!group_was_created("Group FOO-External updated.\n"));
        assert!(!group_was_created("Group FOO not updated.\n"));
        assert!(group_was_created("Protections saved.\nGroup FOO created.\n"));
    }

    #[test]
    fn test_stream_form_exists() {
        let saved = SpecForm::parse("Stream:\t//FOO/FOO-main\n\nUpdate:\t2024/01/02 10:00:00\n");
        let fresh = SpecForm::parse("Stream:\t//FOO/FOO-main\n\nType:\tmainline\n");
        assert!(stream_form_exists(&saved));
        assert!(!stream_form_exists(&fresh));
    }

    #[test]
    fn test_parent_field_defaults_to_none() {
        assert_eq!(parent_field(None), "none");
        assert_eq!(parent_field(Some("//FOO/FOO-main")), "//FOO/FOO-main");
    }

    #[test]
    fn test_new_requires_binary() {
        let settings = ConnectionSettings {
            binary: "p4-binary-that-does-not-exist".to_string(),
            ..Default::default()
        };
        let err = P4Backend::new(settings).unwrap_err();
        assert_eq!(err.operation, ops::CONNECT);
    }
}
