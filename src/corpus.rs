// src/corpus.rs
//
// Startup inputs: the domain knowledge base, the slot/value dictionary,
// and the user-goal corpus. Loaded once at startup and handed opaquely to
// the collaborators; the orchestrator never looks inside them.
//
// A small built-in movie-ticket corpus backs `Default` so tests and
// file-less runs work without any data files on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::FilePathsConfig;

/// One knowledge-base record: slot -> value.
pub type KbRecord = BTreeMap<String, String>;

/// Domain knowledge base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub records: Vec<KbRecord>,
}

impl KnowledgeBase {
    /// Records consistent with every given constraint.
    ///
    /// A record matches when, for each constrained slot it carries, the
    /// values agree; a record missing a constrained slot does not match.
    pub fn matching(&self, constraints: &BTreeMap<String, String>) -> Vec<&KbRecord> {
        self.records
            .iter()
            .filter(|rec| {
                constraints
                    .iter()
                    .all(|(slot, value)| rec.get(slot).map(String::as_str) == Some(value.as_str()))
            })
            .collect()
    }

    /// Most common value for `slot` among records matching `constraints`.
    pub fn fill_value(&self, slot: &str, constraints: &BTreeMap<String, String>) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for rec in self.matching(constraints) {
            if let Some(v) = rec.get(slot) {
                *counts.entry(v.as_str()).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|&(_, n)| n)
            .map(|(v, _)| v.to_string())
    }
}

/// Slot dictionary: slot -> candidate values.
///
/// The sorted key order is the canonical slot ordering used by the state
/// encoder and the agent's action space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotDictionary {
    pub values: BTreeMap<String, Vec<String>>,
}

impl SlotDictionary {
    /// Canonical sorted slot list.
    pub fn slots(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn candidates(&self, slot: &str) -> &[String] {
        self.values.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A simulated user's task goal: constraints it will inform and slots it
/// wants answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGoal {
    pub inform_slots: BTreeMap<String, String>,
    pub request_slots: Vec<String>,
}

/// The three startup corpora, bundled.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub kb: KnowledgeBase,
    pub dict: SlotDictionary,
    pub goals: Vec<UserGoal>,
}

impl Corpus {
    /// Load all three corpora from the configured paths.
    pub fn load(paths: &FilePathsConfig) -> Result<Corpus> {
        let kb = KnowledgeBase {
            records: load_json(Path::new(&paths.database))
                .context("failed to load knowledge base")?,
        };
        let dict = SlotDictionary {
            values: load_json(Path::new(&paths.dict))
                .context("failed to load slot dictionary")?,
        };
        let goals: Vec<UserGoal> =
            load_json(Path::new(&paths.user_goals)).context("failed to load user goals")?;

        let corpus = Corpus { kb, dict, goals };
        corpus.validate()?;
        Ok(corpus)
    }

    fn validate(&self) -> Result<()> {
        if self.dict.values.is_empty() {
            bail!("slot dictionary is empty");
        }
        if self.goals.is_empty() {
            bail!("user goal corpus is empty");
        }
        Ok(())
    }

    /// Built-in movie-ticket corpus for tests and file-less runs.
    pub fn builtin() -> Corpus {
        let mk = |pairs: &[(&str, &str)]| -> KbRecord {
            pairs
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        let records = vec![
            mk(&[
                ("moviename", "deadpool"),
                ("city", "seattle"),
                ("theater", "regal meridian"),
                ("date", "tomorrow"),
                ("starttime", "9:00 pm"),
                ("numberofpeople", "2"),
            ]),
            mk(&[
                ("moviename", "deadpool"),
                ("city", "seattle"),
                ("theater", "amc pacific place"),
                ("date", "tonight"),
                ("starttime", "7:15 pm"),
                ("numberofpeople", "2"),
            ]),
            mk(&[
                ("moviename", "zootopia"),
                ("city", "portland"),
                ("theater", "regal fox tower"),
                ("date", "tomorrow"),
                ("starttime", "5:30 pm"),
                ("numberofpeople", "4"),
            ]),
            mk(&[
                ("moviename", "zootopia"),
                ("city", "seattle"),
                ("theater", "regal meridian"),
                ("date", "saturday"),
                ("starttime", "1:00 pm"),
                ("numberofpeople", "3"),
            ]),
            mk(&[
                ("moviename", "room"),
                ("city", "portland"),
                ("theater", "living room theaters"),
                ("date", "tonight"),
                ("starttime", "8:00 pm"),
                ("numberofpeople", "1"),
            ]),
        ];

        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rec in &records {
            for (slot, value) in rec {
                let entry = values.entry(slot.clone()).or_default();
                if !entry.contains(value) {
                    entry.push(value.clone());
                }
            }
        }

        let goal = |informs: &[(&str, &str)], requests: &[&str]| UserGoal {
            inform_slots: informs
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            request_slots: requests.iter().map(|s| s.to_string()).collect(),
        };

        let goals = vec![
            goal(
                &[("moviename", "deadpool"), ("city", "seattle")],
                &["theater", "starttime"],
            ),
            goal(
                &[("moviename", "zootopia"), ("date", "tomorrow")],
                &["theater"],
            ),
            goal(
                &[("moviename", "room"), ("city", "portland")],
                &["starttime", "theater"],
            ),
            goal(
                &[("moviename", "zootopia"), ("city", "seattle"), ("date", "saturday")],
                &["starttime"],
            ),
        ];

        Corpus {
            kb: KnowledgeBase { records },
            dict: SlotDictionary { values },
            goals,
        }
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("malformed JSON in {}", path.display()))
}
