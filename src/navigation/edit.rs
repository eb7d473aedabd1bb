use crate::host::{Host, HostError, HostResult};
use crate::relations::{find_direct_relation, find_link_tables_between, JunctionCandidate};
use crate::types::{Record, RecordId, RelationEdge, RelationsSnapshot, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// The user-facing side of an edit: confirmations, choices, messages
pub trait Prompter {
    /// Show the proposed field changes and ask for acceptance
    fn confirm_changes(&mut self, title: &str, lines: &[String]) -> bool;
    fn ask_yes_no(&mut self, title: &str, question: &str) -> bool;
    /// Pick one of `options`, `None` when cancelled
    fn choose(&mut self, title: &str, prompt: &str, options: &[String]) -> Option<usize>;
    /// Let the user review a freshly created record
    fn open_record_form(&mut self, layer_name: &str, record: &Record);
    fn notify(&mut self, level: NoticeLevel, message: &str);
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid drop payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Drop payload carries no rows")]
    Empty,
}

/// Rows dragged out of a board column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPayload {
    pub layer: String,
    pub fids: Vec<RecordId>,
}

impl DropPayload {
    pub fn new(layer: impl Into<String>, fids: Vec<RecordId>) -> Self {
        Self {
            layer: layer.into(),
            fids,
        }
    }

    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let payload: DropPayload = serde_json::from_str(text)?;
        if payload.fids.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(payload)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    pub layer_id: String,
    pub id: RecordId,
}

/// Where rows were dropped: a column, the row under the pointer and the
/// column's current selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub layer_id: String,
    pub row: Option<RowRef>,
    pub selection: Vec<RowRef>,
}

/// How the dragged layer relates to the target layer
#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind<'a> {
    /// The target is the parent: dragged rows get its key
    SourceIsChild(&'a RelationEdge),
    /// The source is the parent: the target row gets the dragged key
    SourceIsParent(&'a RelationEdge),
    ManyToMany(Vec<JunctionCandidate>),
    Unrelated,
}

impl<'a> RelationKind<'a> {
    pub fn detect(snapshot: &'a RelationsSnapshot, source: &str, target: &str) -> Self {
        if let Some(edge) = find_direct_relation(snapshot, target, source) {
            return RelationKind::SourceIsChild(edge);
        }
        if let Some(edge) = find_direct_relation(snapshot, source, target) {
            return RelationKind::SourceIsParent(edge);
        }
        let candidates = find_link_tables_between(snapshot, source, target);
        if candidates.is_empty() {
            RelationKind::Unrelated
        } else {
            RelationKind::ManyToMany(candidates)
        }
    }
}

/// Per-row result of a mutation batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<(RecordId, String)>,
}

impl BatchOutcome {
    fn record(&mut self, id: RecordId, result: HostResult<()>) {
        self.attempted += 1;
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => self.failures.push((id, e.user_message())),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Nothing done; the user was warned
    Rejected(String),
    /// The user declined a prompt
    Cancelled,
    LinkedChildren { layer_id: String, batch: BatchOutcome },
    LinkedTarget { layer_id: String, batch: BatchOutcome },
    JunctionRows {
        layer_id: String,
        created: Vec<RecordId>,
        batch: BatchOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachMode {
    DeleteRow,
    ClearForeignKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetachOutcome {
    Rejected(String),
    Cancelled,
    Done {
        mode: DetachMode,
        layer_id: String,
        batch: BatchOutcome,
        committed: bool,
    },
}

/// Write the parent's key values into the child's foreign-key fields
fn set_child_fk(
    host: &mut dyn Host,
    edge: &RelationEdge,
    parent: &Record,
    child_id: RecordId,
) -> HostResult<()> {
    for pair in &edge.pairs {
        let value = parent
            .get(&pair.parent_field)
            .cloned()
            .ok_or_else(|| HostError::FieldNotFound {
                layer: edge.parent_layer_id.clone(),
                field: pair.parent_field.clone(),
            })?;
        host.set_value(&edge.child_layer_id, child_id, &pair.child_field, value)?;
    }
    Ok(())
}

/// Null every foreign-key field of `edge` on one child row
fn clear_child_fk(host: &mut dyn Host, edge: &RelationEdge, child_id: RecordId) -> HostResult<()> {
    for pair in &edge.pairs {
        host.set_value(&edge.child_layer_id, child_id, &pair.child_field, Value::Null)?;
    }
    Ok(())
}

/// Everything one edit operation works with
pub struct EditContext<'a> {
    pub host: &'a mut dyn Host,
    pub snapshot: &'a RelationsSnapshot,
    pub prompter: &'a mut dyn Prompter,
    /// Row label as shown in the board
    pub labels: &'a dyn Fn(&str, &Record) -> String,
}

impl EditContext<'_> {
    fn name(&self, layer_id: &str) -> String {
        self.snapshot.layer_name(layer_id).to_string()
    }

    fn reject<T>(&mut self, message: &str, outcome: impl FnOnce(String) -> T) -> T {
        warn!("{}", message);
        self.prompter.notify(NoticeLevel::Warning, message);
        outcome(message.to_string())
    }

    /// Make sure `layer_id` is in an edit session, asking first
    pub fn ensure_editable(&mut self, layer_id: &str) -> bool {
        if self.host.is_editable(layer_id) {
            return true;
        }
        let name = self.name(layer_id);
        if !self
            .prompter
            .ask_yes_no("Enable editing?", &format!("Enable edit mode for «{}»?", name))
        {
            return false;
        }
        match self.host.start_editing(layer_id) {
            Ok(()) => true,
            Err(e) => {
                self.prompter.notify(
                    NoticeLevel::Error,
                    &format!("Could not enable editing on «{}»: {}", name, e.user_message()),
                );
                false
            }
        }
    }

    /// Ask whether to commit now; true when committed
    pub fn offer_commit(&mut self, layer_id: &str) -> bool {
        if !self.host.is_editable(layer_id) {
            return false;
        }
        let name = self.name(layer_id);
        if !self
            .prompter
            .ask_yes_no("Save changes?", &format!("Save the changes to «{}» now?", name))
        {
            return false;
        }
        self.commit(layer_id)
    }

    fn commit(&mut self, layer_id: &str) -> bool {
        let name = self.name(layer_id);
        match self.host.commit(layer_id) {
            Ok(()) => {
                self.prompter
                    .notify(NoticeLevel::Success, &format!("Changes saved to «{}».", name));
                true
            }
            Err(e) => {
                self.prompter.notify(
                    NoticeLevel::Error,
                    &format!("Saving «{}» failed: {}", name, e.user_message()),
                );
                false
            }
        }
    }

    /// Commit pending edits after confirmation
    pub fn commit_layer(&mut self, layer_id: &str) -> bool {
        if !self.host.is_editable(layer_id) {
            return false;
        }
        self.offer_commit(layer_id)
    }

    /// Drop pending edits after confirmation
    pub fn rollback_layer(&mut self, layer_id: &str) -> bool {
        if !self.host.is_editable(layer_id) {
            return false;
        }
        let name = self.name(layer_id);
        if self.host.is_modified(layer_id)
            && !self.prompter.ask_yes_no(
                "Discard changes?",
                &format!("Discard the pending changes to «{}»?", name),
            )
        {
            return false;
        }
        match self.host.rollback(layer_id) {
            Ok(()) => {
                self.prompter
                    .notify(NoticeLevel::Success, &format!("Changes to «{}» discarded.", name));
                true
            }
            Err(e) => {
                self.prompter.notify(NoticeLevel::Error, &e.user_message());
                false
            }
        }
    }

    /// Enter or leave the edit session; leaving with pending edits asks
    /// whether to save them
    pub fn toggle_editing(&mut self, layer_id: &str) -> bool {
        let name = self.name(layer_id);
        if !self.host.is_editable(layer_id) {
            return match self.host.start_editing(layer_id) {
                Ok(()) => true,
                Err(e) => {
                    self.prompter.notify(
                        NoticeLevel::Error,
                        &format!("Could not enable editing on «{}»: {}", name, e.user_message()),
                    );
                    false
                }
            };
        }

        if self.host.is_modified(layer_id)
            && self.prompter.ask_yes_no(
                "Stop editing",
                &format!("Save the changes to «{}» before leaving edit mode?", name),
            )
        {
            return self.commit(layer_id);
        }
        match self.host.rollback(layer_id) {
            Ok(()) => true,
            Err(e) => {
                self.prompter.notify(NoticeLevel::Error, &e.user_message());
                false
            }
        }
    }

    fn resolve_target_row(&self, target: &DropTarget) -> Option<Record> {
        let on_layer = |r: &&RowRef| r.layer_id == target.layer_id;
        let candidates = target.row.iter().filter(on_layer).chain(target.selection.iter().filter(on_layer));
        for row in candidates {
            if let Ok(Some(record)) = self.host.record(&row.layer_id, row.id) {
                return Some(record);
            }
        }
        None
    }

    fn change_lines(&self, label: &str, edge: &RelationEdge, parent: &Record, child: &Record) -> Vec<String> {
        edge.pairs
            .iter()
            .map(|p| {
                let old = child.get(&p.child_field).cloned().unwrap_or(Value::Null);
                let new = parent.get(&p.parent_field).cloned().unwrap_or(Value::Null);
                format!("{} : {}  {} → {}", label, p.child_field, old.preview(), new.preview())
            })
            .collect()
    }

    /// Apply a drop of `payload` rows onto `target`
    pub fn handle_drop(&mut self, payload: &str, target: &DropTarget) -> DropOutcome {
        let payload = match DropPayload::parse(payload) {
            Ok(p) => p,
            Err(e) => return self.reject(&e.to_string(), DropOutcome::Rejected),
        };
        if self.snapshot.layer(&payload.layer).is_none() {
            return self.reject("Source layer not found.", DropOutcome::Rejected);
        }
        if self.snapshot.layer(&target.layer_id).is_none() {
            return self.reject("Target layer not found.", DropOutcome::Rejected);
        }

        let snapshot = self.snapshot;
        match RelationKind::detect(snapshot, &payload.layer, &target.layer_id) {
            RelationKind::SourceIsChild(edge) => self.link_children(edge, &payload, target),
            RelationKind::SourceIsParent(edge) => self.link_target(edge, &payload, target),
            RelationKind::ManyToMany(candidates) => self.link_through_junction(candidates, &payload, target),
            RelationKind::Unrelated => self.reject(
                "No 1↔N or N↔N relation between these layers.",
                DropOutcome::Rejected,
            ),
        }
    }

    fn link_children(&mut self, edge: &RelationEdge, payload: &DropPayload, target: &DropTarget) -> DropOutcome {
        let Some(parent) = self.resolve_target_row(target) else {
            return self.reject(
                "Pick (or aim at) a row in the target (parent) column.",
                DropOutcome::Rejected,
            );
        };
        if !self.ensure_editable(&payload.layer) {
            return DropOutcome::Cancelled;
        }

        let mut lines = Vec::new();
        for id in &payload.fids {
            if let Ok(Some(child)) = self.host.record(&payload.layer, *id) {
                let label = (self.labels)(&payload.layer, &child);
                lines.extend(self.change_lines(&label, edge, &parent, &child));
            }
        }
        if !self
            .prompter
            .confirm_changes("Confirm foreign-key updates (1→N)", &lines)
        {
            return DropOutcome::Cancelled;
        }

        let mut batch = BatchOutcome::default();
        for id in &payload.fids {
            let result = match self.host.record(&payload.layer, *id) {
                Ok(Some(_)) => set_child_fk(self.host, edge, &parent, *id),
                Ok(None) => Err(HostError::RecordNotFound {
                    layer: payload.layer.clone(),
                    id: *id,
                }),
                Err(e) => Err(e),
            };
            batch.record(*id, result);
        }

        info!(relation = %edge.id, changed = batch.succeeded, "linked child rows");
        self.report(
            &batch,
            &format!("Relation set (1→N) on {} row(s). Save when ready.", batch.succeeded),
        );
        DropOutcome::LinkedChildren {
            layer_id: payload.layer.clone(),
            batch,
        }
    }

    fn link_target(&mut self, edge: &RelationEdge, payload: &DropPayload, target: &DropTarget) -> DropOutcome {
        let Some(child) = self.resolve_target_row(target) else {
            return self.reject(
                "Pick (or aim at) a row in the target (child) column.",
                DropOutcome::Rejected,
            );
        };
        if !self.ensure_editable(&target.layer_id) {
            return DropOutcome::Cancelled;
        }
        let parent = match self.host.record(&payload.layer, payload.fids[0]) {
            Ok(Some(p)) => p,
            _ => return self.reject("Invalid parent row.", DropOutcome::Rejected),
        };

        let label = (self.labels)(&target.layer_id, &child);
        let lines = self.change_lines(&label, edge, &parent, &child);
        if !self
            .prompter
            .confirm_changes("Confirm foreign-key updates (1→N)", &lines)
        {
            return DropOutcome::Cancelled;
        }

        let mut batch = BatchOutcome::default();
        batch.record(child.id, set_child_fk(self.host, edge, &parent, child.id));

        info!(relation = %edge.id, ok = batch.succeeded == 1, "linked target row");
        self.report(&batch, "Relation set (1→N). Save when ready.");
        DropOutcome::LinkedTarget {
            layer_id: target.layer_id.clone(),
            batch,
        }
    }

    fn link_through_junction(
        &mut self,
        mut candidates: Vec<JunctionCandidate>,
        payload: &DropPayload,
        target: &DropTarget,
    ) -> DropOutcome {
        let candidate = if candidates.len() == 1 {
            candidates.remove(0)
        } else {
            let options: Vec<String> = candidates.iter().map(|c| c.label(self.snapshot)).collect();
            match self.prompter.choose(
                "Choose the link table",
                "Several link tables join these two layers:",
                &options,
            ) {
                Some(i) if i < candidates.len() => candidates.remove(i),
                _ => return DropOutcome::Cancelled,
            }
        };

        let Some(target_row) = self.resolve_target_row(target) else {
            return self.reject(
                "Pick (or aim at) a row in the target column.",
                DropOutcome::Rejected,
            );
        };
        let link_id = candidate.link_layer_id.clone();
        if !self.ensure_editable(&link_id) {
            return DropOutcome::Cancelled;
        }

        let mut batch = BatchOutcome::default();
        let mut created = Vec::new();
        for id in &payload.fids {
            let source = match self.host.record(&payload.layer, *id) {
                Ok(Some(r)) => r,
                Ok(None) => {
                    batch.record(
                        *id,
                        Err(HostError::RecordNotFound {
                            layer: payload.layer.clone(),
                            id: *id,
                        }),
                    );
                    continue;
                }
                Err(e) => {
                    batch.record(*id, Err(e));
                    continue;
                }
            };
            let added = candidate
                .prefilled_values(&source, &target_row)
                .and_then(|values| self.host.add_record(&link_id, &values));
            match added {
                Ok(new_id) => {
                    created.push(new_id);
                    batch.record(*id, Ok(()));
                }
                Err(e) => batch.record(*id, Err(e)),
            }
        }

        if created.is_empty() {
            self.prompter
                .notify(NoticeLevel::Error, "Could not add rows to the link table.");
            return DropOutcome::JunctionRows {
                layer_id: link_id,
                created,
                batch,
            };
        }

        let name = self.name(&link_id);
        for new_id in &created {
            if let Ok(Some(record)) = self.host.record(&link_id, *new_id) {
                self.prompter.open_record_form(&name, &record);
            }
        }

        info!(layer = %link_id, created = created.len(), "created link rows");
        self.report(
            &batch,
            &format!(
                "{} link row(s) created with their keys filled in. Save when ready.",
                created.len()
            ),
        );
        DropOutcome::JunctionRows {
            layer_id: link_id,
            created,
            batch,
        }
    }

    /// Detach a child row from its parent.
    ///
    /// Rows of a layer with two or more incoming relations are deleted after
    /// confirmation; other rows get every foreign-key field of the relation
    /// set to NULL.
    pub fn detach(&mut self, layer_id: &str, relation_id: &str, record_id: RecordId) -> DetachOutcome {
        let snapshot = self.snapshot;
        let Some(edge) = snapshot.edge(relation_id) else {
            return self.reject("Relation not found.", DetachOutcome::Rejected);
        };
        let name = self.name(layer_id);
        let is_junction = snapshot.incoming(layer_id).count() >= 2;

        if !self.ensure_editable(layer_id) {
            return DetachOutcome::Cancelled;
        }

        let mut batch = BatchOutcome::default();
        let mode = if is_junction {
            if !self.prompter.ask_yes_no(
                "Delete the link?",
                &format!(
                    "The selected row belongs to the link table «{}».\nDelete this link?",
                    name
                ),
            ) {
                return DetachOutcome::Cancelled;
            }
            batch.record(record_id, self.host.delete_record(layer_id, record_id));
            if batch.succeeded > 0 {
                self.prompter.notify(NoticeLevel::Success, "Link deleted.");
            } else {
                self.prompter.notify(NoticeLevel::Error, "Deleting the link failed.");
            }
            DetachMode::DeleteRow
        } else {
            batch.record(record_id, clear_child_fk(self.host, edge, record_id));
            if batch.succeeded > 0 {
                self.prompter.notify(
                    NoticeLevel::Success,
                    &format!("Foreign key set to NULL ({} field(s)).", edge.pairs.len()),
                );
            } else {
                self.prompter.notify(NoticeLevel::Error, "Clearing the foreign key failed.");
            }
            DetachMode::ClearForeignKey
        };

        let committed = batch.succeeded > 0 && self.offer_commit(layer_id);
        DetachOutcome::Done {
            mode,
            layer_id: layer_id.to_string(),
            batch,
            committed,
        }
    }

    fn report(&mut self, batch: &BatchOutcome, success: &str) {
        if batch.failures.is_empty() {
            self.prompter.notify(NoticeLevel::Success, success);
            return;
        }
        for (id, reason) in &batch.failures {
            warn!(record = %id, reason = %reason, "row update failed");
        }
        let (level, text) = if batch.succeeded == 0 {
            (NoticeLevel::Error, "Update failed")
        } else {
            (NoticeLevel::Warning, "Partially applied")
        };
        self.prompter.notify(
            level,
            &format!(
                "{}: {} of {} row(s) updated. First error: {}",
                text, batch.succeeded, batch.attempted, batch.failures[0].1
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SqliteHost;
    use crate::relations::capture;
    use crate::relations::fixtures::{self, JUNCTION, PARENT_CHILD};
    use crate::types::{LayerInfo, RelationInfo};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Answers prompts from a script and records what it was shown
    #[derive(Default)]
    struct ScriptedPrompter {
        answers: VecDeque<bool>,
        choice: Option<usize>,
        confirmations: Vec<(String, Vec<String>)>,
        questions: Vec<String>,
        forms: Vec<Record>,
        notices: Vec<(NoticeLevel, String)>,
    }

    impl ScriptedPrompter {
        fn answering(answers: &[bool]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn next(&mut self) -> bool {
            self.answers.pop_front().unwrap_or(false)
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm_changes(&mut self, title: &str, lines: &[String]) -> bool {
            self.confirmations.push((title.to_string(), lines.to_vec()));
            self.next()
        }

        fn ask_yes_no(&mut self, _title: &str, question: &str) -> bool {
            self.questions.push(question.to_string());
            self.next()
        }

        fn choose(&mut self, _title: &str, _prompt: &str, _options: &[String]) -> Option<usize> {
            self.choice
        }

        fn open_record_form(&mut self, _layer_name: &str, record: &Record) {
            self.forms.push(record.clone());
        }

        fn notify(&mut self, level: NoticeLevel, message: &str) {
            self.notices.push((level, message.to_string()));
        }
    }

    /// Host wrapper that logs every mutation
    struct SpyHost {
        inner: SqliteHost,
        writes: Vec<String>,
    }

    impl Host for SpyHost {
        fn layers(&self) -> HostResult<Vec<LayerInfo>> {
            self.inner.layers()
        }
        fn relations(&self) -> HostResult<Vec<RelationInfo>> {
            self.inner.relations()
        }
        fn fields(&self, layer_id: &str) -> HostResult<Vec<String>> {
            self.inner.fields(layer_id)
        }
        fn primary_key_indexes(&self, layer_id: &str) -> HostResult<Vec<usize>> {
            self.inner.primary_key_indexes(layer_id)
        }
        fn is_editable(&self, layer_id: &str) -> bool {
            self.inner.is_editable(layer_id)
        }
        fn is_modified(&self, layer_id: &str) -> bool {
            self.inner.is_modified(layer_id)
        }
        fn start_editing(&mut self, layer_id: &str) -> HostResult<()> {
            self.inner.start_editing(layer_id)
        }
        fn commit(&mut self, layer_id: &str) -> HostResult<()> {
            self.writes.push(format!("commit {}", layer_id));
            self.inner.commit(layer_id)
        }
        fn rollback(&mut self, layer_id: &str) -> HostResult<()> {
            self.inner.rollback(layer_id)
        }
        fn records(&self, layer_id: &str, limit: Option<usize>) -> HostResult<Vec<Record>> {
            self.inner.records(layer_id, limit)
        }
        fn record(&self, layer_id: &str, id: RecordId) -> HostResult<Option<Record>> {
            self.inner.record(layer_id, id)
        }
        fn feature_count(&self, layer_id: &str) -> HostResult<u64> {
            self.inner.feature_count(layer_id)
        }
        fn add_record(&mut self, layer_id: &str, values: &[(String, Value)]) -> HostResult<RecordId> {
            self.writes.push(format!("add {}", layer_id));
            self.inner.add_record(layer_id, values)
        }
        fn delete_record(&mut self, layer_id: &str, id: RecordId) -> HostResult<()> {
            self.writes.push(format!("delete {} {}", layer_id, id));
            self.inner.delete_record(layer_id, id)
        }
        fn set_value(&mut self, layer_id: &str, id: RecordId, field: &str, value: Value) -> HostResult<()> {
            self.writes
                .push(format!("set {} {} {}={}", layer_id, id, field, value.preview()));
            self.inner.set_value(layer_id, id, field, value)
        }
    }

    fn spy(sql: &str) -> (SpyHost, RelationsSnapshot) {
        let inner = fixtures::host(sql);
        let snapshot = capture(&inner).unwrap();
        (
            SpyHost {
                inner,
                writes: Vec::new(),
            },
            snapshot,
        )
    }

    fn label(_layer: &str, record: &Record) -> String {
        record
            .get("label")
            .map(|v| v.display(40))
            .unwrap_or_else(|| record.id.to_string())
    }

    fn row(layer: &str, id: i64) -> RowRef {
        RowRef {
            layer_id: layer.into(),
            id: RecordId(id),
        }
    }

    fn payload(layer: &str, ids: &[i64]) -> String {
        DropPayload::new(layer, ids.iter().map(|i| RecordId(*i)).collect())
            .to_json()
            .unwrap()
    }

    #[test]
    fn parent_row_dropped_on_child_row_sets_the_foreign_key() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::answering(&[true, true]);
        let target = DropTarget {
            layer_id: "child".into(),
            row: Some(row("child", 1)),
            selection: vec![],
        };

        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("parent", &[5]), &target);

        assert_eq!(
            prompter.confirmations,
            vec![(
                "Confirm foreign-key updates (1→N)".to_string(),
                vec!["a : parent_id  NULL → 5".to_string()]
            )]
        );
        assert_eq!(
            outcome,
            DropOutcome::LinkedTarget {
                layer_id: "child".into(),
                batch: BatchOutcome {
                    attempted: 1,
                    succeeded: 1,
                    failures: vec![]
                }
            }
        );
        let child = host.record("child", RecordId(1)).unwrap().unwrap();
        assert_eq!(child.get("parent_id"), Some(&Value::Integer(5)));
        // nothing committed yet
        assert!(host.is_modified("child"));
    }

    #[test]
    fn child_rows_dropped_on_parent_take_its_key() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::answering(&[true, true]);
        let target = DropTarget {
            layer_id: "parent".into(),
            row: None,
            selection: vec![row("parent", 6)],
        };

        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("child", &[1, 2]), &target);

        assert_eq!(
            prompter.confirmations[0].1,
            vec!["a : parent_id  NULL → 6", "b : parent_id  5 → 6"]
        );
        assert!(matches!(outcome, DropOutcome::LinkedChildren { ref batch, .. } if batch.succeeded == 2));
        assert_eq!(
            host.writes,
            vec!["set child 1 parent_id=6", "set child 2 parent_id=6"]
        );
    }

    #[test]
    fn declining_the_confirmation_changes_nothing() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::answering(&[true, false]);
        let target = DropTarget {
            layer_id: "child".into(),
            row: Some(row("child", 1)),
            selection: vec![],
        };
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("parent", &[5]), &target);

        assert_eq!(outcome, DropOutcome::Cancelled);
        assert!(host.writes.is_empty());
        assert!(!host.is_modified("child"));
    }

    #[test]
    fn declining_edit_mode_aborts_before_confirmation() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::answering(&[false]);
        let target = DropTarget {
            layer_id: "child".into(),
            row: Some(row("child", 1)),
            selection: vec![],
        };
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("parent", &[5]), &target);

        assert_eq!(outcome, DropOutcome::Cancelled);
        assert!(prompter.confirmations.is_empty());
        assert!(!host.is_editable("child"));
    }

    #[test]
    fn malformed_payload_and_missing_target_row_warn() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::default();
        let target = DropTarget {
            layer_id: "child".into(),
            row: Some(row("parent", 5)),
            selection: vec![],
        };
        let mut ctx = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        };

        assert!(matches!(ctx.handle_drop("{not json", &target), DropOutcome::Rejected(_)));
        assert!(matches!(
            ctx.handle_drop(r#"{"layer":"parent","fids":[]}"#, &target),
            DropOutcome::Rejected(_)
        ));
        assert!(matches!(
            ctx.handle_drop(&payload("nope", &[1]), &target),
            DropOutcome::Rejected(_)
        ));
        // drop row belongs to another layer and nothing is selected
        assert!(matches!(
            ctx.handle_drop(&payload("parent", &[5]), &target),
            DropOutcome::Rejected(_)
        ));

        assert_eq!(prompter.notices.len(), 4);
        assert!(prompter.notices.iter().all(|(l, _)| *l == NoticeLevel::Warning));
        assert!(host.writes.is_empty());
    }

    #[test]
    fn unrelated_layers_are_rejected() {
        let (mut host, snapshot) = spy(
            "CREATE TABLE x (id INTEGER PRIMARY KEY); CREATE TABLE y (id INTEGER PRIMARY KEY);
             INSERT INTO x VALUES (1); INSERT INTO y VALUES (1);",
        );
        let mut prompter = ScriptedPrompter::default();
        let target = DropTarget {
            layer_id: "y".into(),
            row: Some(row("y", 1)),
            selection: vec![],
        };
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("x", &[1]), &target);
        assert_eq!(
            outcome,
            DropOutcome::Rejected("No 1↔N or N↔N relation between these layers.".into())
        );
    }

    #[test]
    fn drop_between_junction_parents_creates_a_link_row() {
        let (mut host, snapshot) = spy(JUNCTION);
        assert!(snapshot.layers["l"].is_link_table);
        let mut prompter = ScriptedPrompter::answering(&[true]);
        let target = DropTarget {
            layer_id: "b".into(),
            row: Some(row("b", 20)),
            selection: vec![],
        };

        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("a", &[2]), &target);

        let DropOutcome::JunctionRows { layer_id, created, batch } = outcome else {
            panic!("expected junction rows, got {:?}", outcome);
        };
        assert_eq!(layer_id, "l");
        assert_eq!(created.len(), 1);
        assert_eq!(batch.succeeded, 1);

        let link = host.record("l", created[0]).unwrap().unwrap();
        assert_eq!(link.get("fk_a"), Some(&Value::Integer(2)));
        assert_eq!(link.get("fk_b"), Some(&Value::Integer(20)));
        assert_eq!(prompter.forms.len(), 1);

        host.commit("l").unwrap();
        assert_eq!(host.feature_count("l").unwrap(), 2);
    }

    #[test]
    fn several_link_tables_require_a_choice() {
        let (mut host, snapshot) = spy(&format!(
            "{}
             CREATE TABLE l2 (
                 fk_a INTEGER REFERENCES a (id),
                 fk_b INTEGER REFERENCES b (id),
                 PRIMARY KEY (fk_a, fk_b)
             );",
            JUNCTION
        ));
        let target = DropTarget {
            layer_id: "b".into(),
            row: Some(row("b", 10)),
            selection: vec![],
        };

        let mut prompter = ScriptedPrompter::default();
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("a", &[2]), &target);
        assert_eq!(outcome, DropOutcome::Cancelled);

        let mut prompter = ScriptedPrompter::answering(&[true]);
        prompter.choice = Some(1);
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("a", &[2]), &target);
        assert!(matches!(outcome, DropOutcome::JunctionRows { ref layer_id, .. } if layer_id == "l2"));
    }

    #[test]
    fn detach_one_to_many_nulls_the_key_without_deleting() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        // enable editing, then decline the commit
        let mut prompter = ScriptedPrompter::answering(&[true, false]);
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .detach("child", &snapshot.edges[0].id, RecordId(2));

        assert!(matches!(
            outcome,
            DetachOutcome::Done { mode: DetachMode::ClearForeignKey, committed: false, .. }
        ));
        assert_eq!(host.writes, vec!["set child 2 parent_id=NULL"]);
        let child = host.record("child", RecordId(2)).unwrap().unwrap();
        assert_eq!(child.get("parent_id"), Some(&Value::Null));
        assert_eq!(prompter.questions.len(), 2);
    }

    #[test]
    fn detach_counts_a_composite_key_as_one_row() {
        let (mut host, snapshot) = spy(
            "CREATE TABLE doc (id INTEGER, rev INTEGER, PRIMARY KEY (id, rev));
             CREATE TABLE note (
                 id INTEGER PRIMARY KEY,
                 doc_id INTEGER,
                 doc_rev INTEGER,
                 FOREIGN KEY (doc_id, doc_rev) REFERENCES doc (id, rev)
             );
             INSERT INTO doc (id, rev) VALUES (1, 2);
             INSERT INTO note (id, doc_id, doc_rev) VALUES (7, 1, 2);",
        );
        let mut prompter = ScriptedPrompter::answering(&[true, false]);
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .detach("note", &snapshot.edges[0].id, RecordId(7));

        let DetachOutcome::Done { batch, .. } = outcome else {
            panic!("detach did not run: {:?}", outcome);
        };
        assert_eq!((batch.attempted, batch.succeeded, batch.failed()), (1, 1, 0));
        assert_eq!(
            host.writes,
            vec!["set note 7 doc_id=NULL", "set note 7 doc_rev=NULL"]
        );
        assert!(prompter
            .notices
            .iter()
            .any(|(_, text)| text == "Foreign key set to NULL (2 field(s))."));
    }

    #[test]
    fn detach_junction_row_deletes_it_and_offers_commit() {
        let (mut host, snapshot) = spy(JUNCTION);
        let link_edge = snapshot.incoming("l").next().unwrap().id.clone();
        // enable editing, confirm delete, commit
        let mut prompter = ScriptedPrompter::answering(&[true, true, true]);
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .detach("l", &link_edge, RecordId(1));

        assert!(matches!(
            outcome,
            DetachOutcome::Done { mode: DetachMode::DeleteRow, committed: true, .. }
        ));
        assert_eq!(host.writes, vec!["delete l 1", "commit l"]);
        assert_eq!(host.feature_count("l").unwrap(), 0);
    }

    #[test]
    fn failed_writes_are_counted_per_row() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::answering(&[true, true]);
        let target = DropTarget {
            layer_id: "parent".into(),
            row: Some(row("parent", 5)),
            selection: vec![],
        };
        let outcome = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        }
        .handle_drop(&payload("child", &[1, 99]), &target);

        let DropOutcome::LinkedChildren { batch, .. } = outcome else {
            panic!("expected linked children");
        };
        assert_eq!(batch.attempted, 2);
        assert_eq!(batch.succeeded, 1);
        assert_eq!(batch.failures[0].0, RecordId(99));
        assert_eq!(prompter.notices.last().unwrap().0, NoticeLevel::Warning);
    }

    #[test]
    fn toggle_editing_asks_to_save_pending_changes() {
        let (mut host, snapshot) = spy(PARENT_CHILD);
        let mut prompter = ScriptedPrompter::answering(&[false]);
        let mut ctx = EditContext {
            host: &mut host,
            snapshot: &snapshot,
            prompter: &mut prompter,
            labels: &label,
        };
        assert!(ctx.toggle_editing("child"));
        assert!(ctx.host.is_editable("child"));
        ctx.host
            .set_value("child", RecordId(1), "parent_id", Value::Integer(6))
            .unwrap();

        // answer "no" to saving: edits are discarded
        assert!(ctx.toggle_editing("child"));
        assert!(!ctx.host.is_editable("child"));
        let child = ctx.host.record("child", RecordId(1)).unwrap().unwrap();
        assert_eq!(child.get("parent_id"), Some(&Value::Null));
    }
}
