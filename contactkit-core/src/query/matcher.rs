use std::collections::HashSet;

use shared_types::{ContactsResult, Field, Item, MatchPolicy, Query};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::store::FieldSet;

/// Case and diacritic folding used by the substring clauses.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Combines clause counts under a match policy. No populated clause means
/// every record matches.
pub fn decide(policy: MatchPolicy, clauses: usize, matched: usize) -> bool {
    if clauses == 0 {
        return true;
    }
    match policy {
        MatchPolicy::All => matched == clauses,
        MatchPolicy::Any => matched > 0,
    }
}

fn populated(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn populated_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn name_text(item: &Item) -> String {
    [
        item.given_name.as_str(),
        item.middle_name.as_str(),
        item.family_name.as_str(),
        item.nickname.as_str(),
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
}

fn email_domain(value: &str) -> Option<String> {
    value
        .trim()
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
}

/// A Query with its values folded and its group clause resolved into a
/// member set, ready to be evaluated against every candidate.
#[derive(Debug, Clone, Default)]
pub struct CompiledQuery {
    name: Option<String>,
    organization: Option<String>,
    email_domain: Option<String>,
    note: Option<String>,
    group_members: Option<HashSet<String>>,
    ids: Option<HashSet<String>>,
    policy: MatchPolicy,
}

impl CompiledQuery {
    /// Compiles `query`. `members_of` is called once per named group; its
    /// first error aborts compilation.
    pub fn compile<F>(query: &Query, mut members_of: F) -> ContactsResult<Self>
    where
        F: FnMut(&str) -> ContactsResult<Vec<String>>,
    {
        let group_ids = populated_list(&query.group_ids_any);
        let group_members = if group_ids.is_empty() {
            None
        } else {
            let mut members = HashSet::new();
            for group_id in &group_ids {
                members.extend(members_of(group_id)?);
            }
            Some(members)
        };

        let ids = populated_list(&query.ids);

        Ok(Self {
            name: populated(&query.name_contains).map(fold),
            organization: populated(&query.organization_contains).map(fold),
            email_domain: populated(&query.email_domain)
                .map(|domain| domain.trim_start_matches('@').trim().to_lowercase())
                .filter(|domain| !domain.is_empty()),
            note: populated(&query.note_contains).map(fold),
            group_members,
            ids: (!ids.is_empty()).then(|| ids.into_iter().collect()),
            policy: query.match_policy,
        })
    }

    pub fn clause_count(&self) -> usize {
        [
            self.name.is_some(),
            self.organization.is_some(),
            self.email_domain.is_some(),
            self.note.is_some(),
            self.group_members.is_some(),
            self.ids.is_some(),
        ]
        .iter()
        .filter(|populated| **populated)
        .count()
    }

    /// Fields the store must hydrate for matching, sorting and metadata.
    pub fn candidate_fields(&self) -> FieldSet {
        let mut fields = FieldSet::empty()
            .with(Field::Names)
            .with(Field::Organization);
        if self.email_domain.is_some() {
            fields = fields.with(Field::Emails);
        }
        if self.note.is_some() {
            fields = fields.with(Field::Note);
        }
        fields
    }

    pub fn matches(&self, item: &Item) -> bool {
        let outcomes = [
            self.name
                .as_ref()
                .map(|name| fold(&name_text(item)).contains(name.as_str())),
            self.organization
                .as_ref()
                .map(|org| fold(&item.organization).contains(org.as_str())),
            self.email_domain.as_ref().map(|domain| {
                item.emails
                    .iter()
                    .filter_map(|email| email_domain(&email.value))
                    .any(|candidate| &candidate == domain)
            }),
            self.note
                .as_ref()
                .map(|note| fold(&item.note).contains(note.as_str())),
            self.group_members
                .as_ref()
                .map(|members| members.contains(item.id())),
            self.ids.as_ref().map(|ids| ids.contains(item.id())),
        ];

        let clauses = outcomes.iter().flatten().count();
        let matched = outcomes.iter().flatten().filter(|hit| **hit).count();
        decide(self.policy, clauses, matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::{ContactsError, ErrorCode, LabeledValue, Ref};

    fn priya() -> Item {
        Item {
            contact_ref: Ref::new("c-1"),
            given_name: "Priya".to_string(),
            family_name: "N.".to_string(),
            organization: "Acme Corp".to_string(),
            note: "Met at the Zürich offsite".to_string(),
            emails: vec![LabeledValue::new("work", "priya@Acme.com")],
            ..Default::default()
        }
    }

    fn no_groups(_: &str) -> ContactsResult<Vec<String>> {
        Ok(Vec::new())
    }

    #[test]
    fn test_fold_strips_diacritics_and_case() {
        assert_eq!(fold("Zoë Ångström"), "zoe angstrom");
        assert_eq!(fold("JOSÉ"), "jose");
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let compiled = CompiledQuery::compile(&Query::default(), no_groups).unwrap();
        assert_eq!(compiled.clause_count(), 0);
        assert!(compiled.matches(&priya()));
        assert!(compiled.matches(&Item::default()));
    }

    #[test]
    fn test_blank_clauses_are_not_populated() {
        let query = Query {
            name_contains: Some("   ".to_string()),
            email_domain: Some("@".to_string()),
            group_ids_any: vec![" ".to_string()],
            ids: vec![String::new()],
            ..Default::default()
        };
        let compiled = CompiledQuery::compile(&query, |_| {
            Err(ContactsError::store("should not be called"))
        })
        .unwrap();
        assert_eq!(compiled.clause_count(), 0);
        assert!(compiled.matches(&priya()));
    }

    #[test]
    fn test_priya_at_acme_matches_all() {
        let query = Query {
            name_contains: Some("priya".to_string()),
            organization_contains: Some("acme".to_string()),
            ..Default::default()
        };
        let compiled = CompiledQuery::compile(&query, no_groups).unwrap();
        assert!(compiled.matches(&priya()));

        let mut elsewhere = priya();
        elsewhere.organization = "Globex".to_string();
        assert!(!compiled.matches(&elsewhere));
    }

    #[test]
    fn test_any_policy_needs_one_clause() {
        let query = Query {
            name_contains: Some("nobody".to_string()),
            organization_contains: Some("acme".to_string()),
            match_policy: MatchPolicy::Any,
            ..Default::default()
        };
        let compiled = CompiledQuery::compile(&query, no_groups).unwrap();
        assert!(compiled.matches(&priya()));
    }

    #[test]
    fn test_name_matches_across_parts_and_nickname() {
        let mut item = priya();
        item.nickname = "PJ".to_string();
        for needle in ["priya n.", "pj", "a n"] {
            let query = Query {
                name_contains: Some(needle.to_string()),
                ..Default::default()
            };
            let compiled = CompiledQuery::compile(&query, no_groups).unwrap();
            assert!(compiled.matches(&item), "needle {:?}", needle);
        }
    }

    #[test]
    fn test_email_domain_is_exact_and_case_insensitive() {
        let item = priya();
        for (domain, expected) in [
            ("acme.com", true),
            ("@ACME.COM", true),
            ("acme", false),
            ("mail.acme.com", false),
        ] {
            let query = Query {
                email_domain: Some(domain.to_string()),
                ..Default::default()
            };
            let compiled = CompiledQuery::compile(&query, no_groups).unwrap();
            assert_eq!(compiled.matches(&item), expected, "domain {:?}", domain);
        }
    }

    #[test]
    fn test_note_is_folded() {
        let query = Query {
            note_contains: Some("zurich".to_string()),
            ..Default::default()
        };
        let compiled = CompiledQuery::compile(&query, no_groups).unwrap();
        assert!(compiled.matches(&priya()));
        assert!(compiled.candidate_fields().contains(Field::Note));
    }

    #[test]
    fn test_note_not_requested_without_note_clause() {
        let compiled = CompiledQuery::compile(&Query::default(), no_groups).unwrap();
        let fields = compiled.candidate_fields();
        assert!(fields.contains(Field::Names));
        assert!(!fields.contains(Field::Note));
        assert!(!fields.contains(Field::Emails));
    }

    #[test]
    fn test_group_members_resolved_once_per_group() {
        let mut calls = Vec::new();
        let query = Query {
            group_ids_any: vec!["G1".to_string(), "G2".to_string()],
            ..Default::default()
        };
        let compiled = CompiledQuery::compile(&query, |group_id| {
            calls.push(group_id.to_string());
            Ok(match group_id {
                "G2" => vec!["c-1".to_string()],
                _ => vec!["c-9".to_string()],
            })
        })
        .unwrap();

        assert_eq!(calls, vec!["G1", "G2"]);
        assert!(compiled.matches(&priya()));
    }

    #[test]
    fn test_group_resolution_error_aborts() {
        let query = Query {
            group_ids_any: vec!["G404".to_string()],
            ..Default::default()
        };
        let err = CompiledQuery::compile(&query, |group_id| {
            Err(ContactsError::not_found(format!("group {} not found", group_id)))
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    /// Builds a query/record pair where each clause is either absent
    /// (`None`) or present with a chosen outcome.
    fn scenario(clauses: &[Option<bool>; 6], policy: MatchPolicy) -> (CompiledQuery, Item) {
        let mut query = Query {
            match_policy: policy,
            ..Default::default()
        };
        let mut item = Item {
            contact_ref: Ref::new("c-1"),
            given_name: "Zed".to_string(),
            organization: "Globex".to_string(),
            emails: vec![LabeledValue::new("", "z@globex.com")],
            ..Default::default()
        };
        let mut members = Vec::new();

        if let Some(hit) = clauses[0] {
            query.name_contains = Some("priya".to_string());
            if hit {
                item.given_name = "Priya".to_string();
            }
        }
        if let Some(hit) = clauses[1] {
            query.organization_contains = Some("acme".to_string());
            if hit {
                item.organization = "Acme Corp".to_string();
            }
        }
        if let Some(hit) = clauses[2] {
            query.email_domain = Some("acme.com".to_string());
            if hit {
                item.emails.push(LabeledValue::new("", "p@acme.com"));
            }
        }
        if let Some(hit) = clauses[3] {
            query.note_contains = Some("vip".to_string());
            if hit {
                item.note = "VIP client".to_string();
            }
        }
        if let Some(hit) = clauses[4] {
            query.group_ids_any = vec!["G1".to_string()];
            if hit {
                members.push("c-1".to_string());
            }
        }
        if let Some(hit) = clauses[5] {
            query.ids = vec![if hit { "c-1" } else { "c-2" }.to_string()];
        }

        let compiled = CompiledQuery::compile(&query, |_| Ok(members.clone())).unwrap();
        (compiled, item)
    }

    fn arb_policy() -> impl Strategy<Value = MatchPolicy> {
        prop_oneof![Just(MatchPolicy::All), Just(MatchPolicy::Any)]
    }

    proptest! {
        #[test]
        fn prop_clause_counting_rule(
            clauses in prop::array::uniform6(prop::option::of(any::<bool>())),
            policy in arb_policy(),
        ) {
            let (compiled, item) = scenario(&clauses, policy);
            let populated = clauses.iter().flatten().count();
            let matched = clauses.iter().flatten().filter(|hit| **hit).count();

            prop_assert_eq!(compiled.clause_count(), populated);

            let expected = match policy {
                _ if populated == 0 => true,
                MatchPolicy::All => matched == populated,
                MatchPolicy::Any => matched > 0,
            };
            prop_assert_eq!(compiled.matches(&item), expected);
        }
    }
}
