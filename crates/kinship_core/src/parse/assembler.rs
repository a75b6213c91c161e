//! Record assembly from tokenized lines.
//!
//! # Responsibility
//! - Rebuild `Individual` and `FamilyDraft` records from a `RawLine` stream.
//! - Track the open record and its event context across lines.
//!
//! # Invariants
//! - Only level-0 `INDI`/`FAM` lines with an id open a record.
//! - Any other level-0 line closes the open record without opening one.
//! - `DATE`/`PLAC` attach to the most recent event tag of the open record,
//!   whatever their level; only a new event tag or a new record changes it.
//! - Date values are stored verbatim; no date parsing happens here.

use crate::model::individual::{FamilyDraft, Individual, Sex};
use crate::parse::tokenizer::RawLine;
use std::collections::HashMap;

const TAG_INDIVIDUAL: &str = "INDI";
const TAG_FAMILY: &str = "FAM";

/// Event whose `DATE`/`PLAC` lines are currently being attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventContext {
    None,
    Birth,
    /// `CHR`/`BAPM`; only fills birth fields still empty.
    Christening,
    Death,
    /// `BURI`; only fills death fields still empty.
    Burial,
}

impl EventContext {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "BIRT" => Some(Self::Birth),
            "CHR" | "BAPM" => Some(Self::Christening),
            "DEAT" => Some(Self::Death),
            "BURI" => Some(Self::Burial),
            _ => None,
        }
    }

    fn is_proxy(self) -> bool {
        matches!(self, Self::Christening | Self::Burial)
    }
}

/// Individuals and families reconstructed from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledDocument {
    pub individuals: HashMap<String, Individual>,
    families: Vec<FamilyDraft>,
    family_positions: HashMap<String, usize>,
}

impl AssembledDocument {
    /// Families in document order.
    pub fn families(&self) -> &[FamilyDraft] {
        &self.families
    }

    pub fn family(&self, id: &str) -> Option<&FamilyDraft> {
        self.family_positions
            .get(id)
            .map(|position| &self.families[*position])
    }

    pub fn individual(&self, id: &str) -> Option<&Individual> {
        self.individuals.get(id)
    }

    fn commit_family(&mut self, family: FamilyDraft) {
        match self.family_positions.get(&family.id) {
            Some(position) => self.families[*position] = family,
            None => {
                self.family_positions
                    .insert(family.id.clone(), self.families.len());
                self.families.push(family);
            }
        }
    }
}

#[derive(Debug)]
struct OpenIndividual {
    draft: Individual,
    event: EventContext,
}

#[derive(Debug)]
enum OpenRecord {
    Individual(OpenIndividual),
    Family(FamilyDraft),
}

/// Line-by-line state machine behind [`assemble`].
#[derive(Debug, Default)]
pub struct RecordAssembler {
    open: Option<OpenRecord>,
    output: AssembledDocument,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event context of the open individual, if any.
    pub fn current_event(&self) -> EventContext {
        match &self.open {
            Some(OpenRecord::Individual(open)) => open.event,
            _ => EventContext::None,
        }
    }

    pub fn feed(&mut self, line: &RawLine) {
        if line.level == 0 {
            self.flush();
            self.open = match (line.id.as_deref(), line.tag.as_str()) {
                (Some(id), TAG_INDIVIDUAL) => Some(OpenRecord::Individual(OpenIndividual {
                    draft: Individual::new(id),
                    event: EventContext::None,
                })),
                (Some(id), TAG_FAMILY) => Some(OpenRecord::Family(FamilyDraft::new(id))),
                _ => None,
            };
            return;
        }

        match self.open.as_mut() {
            Some(OpenRecord::Individual(open)) => apply_individual_line(open, line),
            Some(OpenRecord::Family(family)) => apply_family_line(family, line),
            None => {}
        }
    }

    pub fn finish(mut self) -> AssembledDocument {
        self.flush();
        self.output
    }

    fn flush(&mut self) {
        match self.open.take() {
            Some(OpenRecord::Individual(open)) => {
                self.output
                    .individuals
                    .insert(open.draft.id.clone(), open.draft);
            }
            Some(OpenRecord::Family(family)) => self.output.commit_family(family),
            None => {}
        }
    }
}

/// Assembles a whole line stream.
pub fn assemble<I>(lines: I) -> AssembledDocument
where
    I: IntoIterator<Item = RawLine>,
{
    let mut assembler = RecordAssembler::new();
    for line in lines {
        assembler.feed(&line);
    }
    assembler.finish()
}

fn apply_individual_line(open: &mut OpenIndividual, line: &RawLine) {
    if let Some(event) = EventContext::from_tag(&line.tag) {
        open.event = event;
        return;
    }

    match line.tag.as_str() {
        "NAME" => open.draft.name = strip_name_delimiters(&line.value),
        "SEX" => open.draft.sex = Sex::from_raw(&line.value),
        "DATE" => attach_event_value(open, true, &line.value),
        "PLAC" => attach_event_value(open, false, &line.value),
        _ => {}
    }
}

fn attach_event_value(open: &mut OpenIndividual, is_date: bool, value: &str) {
    let draft = &mut open.draft;
    let field = match (open.event, is_date) {
        (EventContext::Birth | EventContext::Christening, true) => &mut draft.birth_date,
        (EventContext::Birth | EventContext::Christening, false) => &mut draft.birth_place,
        (EventContext::Death | EventContext::Burial, true) => &mut draft.death_date,
        (EventContext::Death | EventContext::Burial, false) => &mut draft.death_place,
        (EventContext::None, _) => return,
    };
    if value.is_empty() || (open.event.is_proxy() && field.is_some()) {
        return;
    }
    *field = Some(value.to_string());
}

fn apply_family_line(family: &mut FamilyDraft, line: &RawLine) {
    let reference = match line.tag.as_str() {
        "HUSB" | "WIFE" | "CHIL" => strip_reference(&line.value),
        _ => return,
    };
    let Some(reference) = reference else {
        return;
    };
    match line.tag.as_str() {
        "HUSB" => family.husband_ref = Some(reference),
        "WIFE" => family.wife_ref = Some(reference),
        _ => family.child_refs.push(reference),
    }
}

/// Removes `/surname/` delimiters and collapses whitespace.
pub fn strip_name_delimiters(value: &str) -> String {
    value
        .replace('/', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_reference(value: &str) -> Option<String> {
    let stripped = value.trim().trim_matches('@');
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{assemble, strip_name_delimiters, EventContext, RecordAssembler};
    use crate::model::individual::Sex;
    use crate::parse::tokenizer::{parse_line, tokenize, RawLine};

    fn lines(text: &str) -> Vec<RawLine> {
        tokenize(text).filter_map(Result::ok).collect()
    }

    #[test]
    fn name_delimiters_are_stripped() {
        assert_eq!(strip_name_delimiters("Jan /Novak/"), "Jan Novak");
        assert_eq!(strip_name_delimiters("/Novak/"), "Novak");
        assert_eq!(strip_name_delimiters("Anna Marie /von Berg/ Jr."), "Anna Marie von Berg Jr.");
    }

    #[test]
    fn assembles_individual_with_events() {
        let doc = assemble(lines(
            "0 @I1@ INDI\n1 NAME Jan /Novak/\n1 SEX M\n1 BIRT\n2 DATE 1919\n2 PLAC Brno\n\
             1 DEAT\n2 DATE 3 MAR 1980\n2 PLAC Praha\n0 TRLR\n",
        ));
        let jan = doc.individual("I1").unwrap();
        assert_eq!(jan.name, "Jan Novak");
        assert_eq!(jan.sex, Sex::Male);
        assert_eq!(jan.birth_date.as_deref(), Some("1919"));
        assert_eq!(jan.birth_place.as_deref(), Some("Brno"));
        assert_eq!(jan.death_date.as_deref(), Some("3 MAR 1980"));
        assert_eq!(jan.death_place.as_deref(), Some("Praha"));
    }

    #[test]
    fn date_without_event_context_is_ignored() {
        let doc = assemble(lines("0 @I1@ INDI\n1 NAME A\n2 DATE 1900\n1 RESI\n2 DATE 1920\n"));
        let person = doc.individual("I1").unwrap();
        assert_eq!(person.birth_date, None);
        assert_eq!(person.death_date, None);
    }

    #[test]
    fn event_context_survives_non_event_tags() {
        let mut assembler = RecordAssembler::new();
        for line in lines(
            "0 @I1@ INDI\n1 BIRT\n2 DATE 1900\n1 RESI\n2 DATE 1920\n2 PLAC Brno\n",
        ) {
            assembler.feed(&line);
        }
        assert_eq!(assembler.current_event(), EventContext::Birth);
        let doc = assembler.finish();
        let person = doc.individual("I1").unwrap();
        assert_eq!(person.birth_date.as_deref(), Some("1920"));
        assert_eq!(person.birth_place.as_deref(), Some("Brno"));
    }

    #[test]
    fn dates_at_any_depth_attach_to_current_event() {
        let doc = assemble(lines("0 @I1@ INDI\n1 BIRT\n2 SOUR @S1@\n3 DATE 1950\n"));
        assert_eq!(doc.individual("I1").unwrap().birth_date.as_deref(), Some("1950"));
    }

    #[test]
    fn new_event_tag_switches_context() {
        let mut assembler = RecordAssembler::new();
        for line in lines("0 @I1@ INDI\n1 BIRT\n2 DATE 1900\n1 OCCU Smith\n1 DEAT\n2 DATE 1970\n") {
            assembler.feed(&line);
        }
        assert_eq!(assembler.current_event(), EventContext::Death);
        let doc = assembler.finish();
        let person = doc.individual("I1").unwrap();
        assert_eq!(person.birth_date.as_deref(), Some("1900"));
        assert_eq!(person.death_date.as_deref(), Some("1970"));
    }

    #[test]
    fn new_record_resets_event_context() {
        let mut assembler = RecordAssembler::new();
        for line in lines("0 @I1@ INDI\n1 BIRT\n0 @I2@ INDI\n2 DATE 1900\n") {
            assembler.feed(&line);
        }
        assert_eq!(assembler.current_event(), EventContext::None);
        let doc = assembler.finish();
        assert_eq!(doc.individual("I2").unwrap().birth_date, None);
    }

    #[test]
    fn christening_fills_birth_only_when_missing() {
        let doc = assemble(lines(
            "0 @I1@ INDI\n1 CHR\n2 DATE 1801\n2 PLAC Tabor\n\
             0 @I2@ INDI\n1 BIRT\n2 DATE 1799\n1 CHR\n2 DATE 1800\n1 BURI\n2 DATE 1860\n",
        ));
        let first = doc.individual("I1").unwrap();
        assert_eq!(first.birth_date.as_deref(), Some("1801"));
        assert_eq!(first.birth_place.as_deref(), Some("Tabor"));
        let second = doc.individual("I2").unwrap();
        assert_eq!(second.birth_date.as_deref(), Some("1799"));
        assert_eq!(second.death_date.as_deref(), Some("1860"));
    }

    #[test]
    fn assembles_family_references_in_document_order() {
        let doc = assemble(lines(
            "0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I4@\n1 CHIL @I3@\n1 MARR\n2 DATE 1940\n",
        ));
        let family = doc.family("F1").unwrap();
        assert_eq!(family.husband_ref.as_deref(), Some("I1"));
        assert_eq!(family.wife_ref.as_deref(), Some("I2"));
        assert_eq!(family.child_refs, vec!["I4".to_string(), "I3".to_string()]);
    }

    #[test]
    fn level_zero_without_id_closes_record() {
        let doc = assemble(lines(
            "0 @I1@ INDI\n1 NAME Before\n0 NOTE stray\n1 NAME After\n0 @S1@ SOUR\n1 TITL x\n",
        ));
        assert_eq!(doc.individuals.len(), 1);
        assert_eq!(doc.individual("I1").unwrap().name, "Before");
        assert!(doc.families().is_empty());
    }

    #[test]
    fn lines_before_any_record_are_ignored() {
        let doc = assemble(lines("1 NAME Orphan\n1 HUSB @I1@\n"));
        assert!(doc.individuals.is_empty());
        assert!(doc.families().is_empty());
    }

    #[test]
    fn families_keep_first_appearance_order() {
        let doc = assemble(lines(
            "0 @F2@ FAM\n1 HUSB @I1@\n0 @F1@ FAM\n0 @F2@ FAM\n1 WIFE @I2@\n",
        ));
        let ids = doc.families().iter().map(|f| f.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["F2", "F1"]);
        let replaced = doc.family("F2").unwrap();
        assert_eq!(replaced.husband_ref, None);
        assert_eq!(replaced.wife_ref.as_deref(), Some("I2"));
    }

    #[test]
    fn skipped_line_does_not_alter_open_record() {
        let mut diagnostics = Vec::new();
        let mut assembler = RecordAssembler::new();
        for (index, text) in ["0 @I1@ INDI", "1 NAME Jan /Novak/", "garbage text", "1 SEX F"]
            .iter()
            .enumerate()
        {
            match parse_line(index + 1, text) {
                Ok(line) => assembler.feed(&line),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }
        let doc = assembler.finish();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line_number, 3);
        let person = doc.individual("I1").unwrap();
        assert_eq!(person.name, "Jan Novak");
        assert_eq!(person.sex, Sex::Female);
        assert_eq!(person.birth_date, None);
    }
}
