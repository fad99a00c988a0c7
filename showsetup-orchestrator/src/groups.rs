//! Group merging.
//!
//! A configured group is created if missing and otherwise only extended:
//! members are appended when absent and an existing description is kept.

use showsetup_backend::{Backend, GroupObject, Result};
use showsetup_config::{GroupSpec, MemberRef, Relation, EMPTY_GROUP_SENTINEL};
use tracing::{debug, info};

use crate::context::ProvisioningContext;
use crate::ledger::GroupRecord;

/// Names a reference stands for. `{"groups": g}` expands to the users of
/// `g` without following its subgroups.
fn expand_reference(
    backend: &dyn Backend,
    reference: &MemberRef,
    ctx: &ProvisioningContext,
) -> Result<Vec<String>> {
    Ok(match reference {
        MemberRef::Name(name) => vec![ctx.resolve(name)],
        MemberRef::Names(names) => names.iter().map(|name| ctx.resolve(name)).collect(),
        MemberRef::Group { groups } => {
            let source = backend.read_group(&ctx.resolve(groups))?;
            source
                .users()
                .iter()
                .filter(|user| user.as_str() != EMPTY_GROUP_SENTINEL)
                .cloned()
                .collect()
        }
    })
}

/// Merge `spec` into `group` without writing it.
pub fn merge_group(
    backend: &dyn Backend,
    group: &mut GroupObject,
    spec: &GroupSpec,
    ctx: &ProvisioningContext,
) -> Result<()> {
    group.describe_if_empty(ctx.created_by());

    if let GroupSpec::Members(relations) = spec {
        for (relation, references) in relations {
            for reference in references {
                for member in expand_reference(backend, reference, ctx)? {
                    if group.add_member(*relation, &member) {
                        debug!("Adding {} to {} of {}", member, relation, group.name());
                    }
                }
            }
        }
    }

    // The server drops groups without users.
    if group.users().is_empty() {
        group.add_member(Relation::Users, EMPTY_GROUP_SENTINEL);
    }
    Ok(())
}

/// Create or extend the group named by `template`, in one write.
pub fn ensure_group(
    backend: &dyn Backend,
    template: &str,
    spec: &GroupSpec,
    ctx: &ProvisioningContext,
) -> Result<GroupRecord> {
    let name = ctx.resolve(template);
    let mut group = backend.read_group(&name)?;
    merge_group(backend, &mut group, spec, ctx)?;

    let outcome = backend.write_group(&group)?;
    info!("Group {} {:?}", name, outcome);
    Ok(GroupRecord { name, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use showsetup_backend::mock::MockBackend;
    use showsetup_backend::WriteOutcome;
    use showsetup_core::ShowIdentifier;

    fn ctx() -> ProvisioningContext {
        ProvisioningContext::new(
            ShowIdentifier::parse("FOO").unwrap(),
            "tjen",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
    }

    fn users(names: &[&str]) -> GroupSpec {
        let mut relations = IndexMap::new();
        relations.insert(
            Relation::Users,
            names.iter().map(|n| MemberRef::Name(n.to_string())).collect(),
        );
        GroupSpec::Members(relations)
    }

    fn existing(name: &str, description: &str, members: &[&str]) -> GroupObject {
        GroupObject::existing(
            name,
            description,
            Vec::new(),
            members.iter().map(|m| m.to_string()).collect(),
            Vec::new(),
        )
    }

    #[test]
    fn test_merge_is_additive() {
        let backend = MockBackend::new();
        backend.seed_group(existing("FOO-Art", "Art team", &["u1"]));

        let record = ensure_group(&backend, "{show}-Art", &users(&["u2"]), &ctx()).unwrap();
        assert_eq!(record.name, "FOO-Art");
        assert_eq!(record.outcome, WriteOutcome::Updated);

        let group = backend.group("FOO-Art").unwrap();
        assert_eq!(group.users(), ["u1", "u2"]);
        assert_eq!(group.description(), "Art team");
    }

    #[test]
    fn test_merge_twice_adds_no_duplicates() {
        let backend = MockBackend::new();
        backend.seed_group(existing("FOO-Art", "", &["u1"]));

        ensure_group(&backend, "{show}-Art", &users(&["u2"]), &ctx()).unwrap();
        ensure_group(&backend, "{show}-Art", &users(&["u2"]), &ctx()).unwrap();
        assert_eq!(backend.group("FOO-Art").unwrap().users(), ["u1", "u2"]);
    }

    #[test]
    fn test_empty_description_is_stamped() {
        let backend = MockBackend::new();
        backend.seed_group(existing("FOO-Art", "", &["u1"]));
        ensure_group(&backend, "{show}-Art", &GroupSpec::Empty, &ctx()).unwrap();
        assert_eq!(
            backend.group("FOO-Art").unwrap().description(),
            "Created by tjen 1/2/2024"
        );
    }

    #[test]
    fn test_new_empty_group_gets_placeholder_user() {
        let backend = MockBackend::new();
        let record = ensure_group(&backend, "{show}", &GroupSpec::Empty, &ctx()).unwrap();
        assert_eq!(record.outcome, WriteOutcome::Created);
        assert_eq!(backend.group("FOO").unwrap().users(), [EMPTY_GROUP_SENTINEL]);
    }

    #[test]
    fn test_group_reference_expands_one_level() {
        let backend = MockBackend::new();
        let mut volume = existing("volume", "", &["v1", "v2"]);
        volume.add_member(Relation::Subgroups, "nested");
        backend.seed_group(volume);
        backend.seed_group(existing("nested", "", &["deep"]));

        let mut relations = IndexMap::new();
        relations.insert(
            Relation::Users,
            vec![MemberRef::Group {
                groups: "volume".to_string(),
            }],
        );
        relations.insert(
            Relation::Owners,
            vec![MemberRef::Names(vec!["{user}".to_string(), "lead".to_string()])],
        );
        ensure_group(&backend, "{show}-External", &GroupSpec::Members(relations), &ctx()).unwrap();

        let group = backend.group("FOO-External").unwrap();
        assert_eq!(group.users(), ["v1", "v2"]);
        assert_eq!(group.members(Relation::Owners), ["tjen", "lead"]);
    }

    #[test]
    fn test_reference_to_missing_group_contributes_nothing() {
        let backend = MockBackend::new();
        let mut relations = IndexMap::new();
        relations.insert(
            Relation::Users,
            vec![MemberRef::Group {
                groups: "missing".to_string(),
            }],
        );
        ensure_group(&backend, "{show}", &GroupSpec::Members(relations), &ctx()).unwrap();
        assert_eq!(backend.group("FOO").unwrap().users(), [EMPTY_GROUP_SENTINEL]);
    }

    #[test]
    fn test_write_fault_propagates() {
        let backend = MockBackend::new();
        backend.fail_on(showsetup_backend::ops::WRITE_GROUP);
        let err = ensure_group(&backend, "{show}", &GroupSpec::Empty, &ctx()).unwrap_err();
        assert_eq!(err.operation, showsetup_backend::ops::WRITE_GROUP);
        assert!(backend.group("FOO").is_none());
    }
}
