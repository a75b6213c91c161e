use kinship_core::db::open_db_in_memory;
use kinship_core::{
    FamilyMember, FamilyRepository, ImportService, InferenceService, InferenceSettings,
    SqliteFamilyRepository, TreeId, YearField,
};
use rusqlite::Connection;
use uuid::Uuid;

const SINGLE_FAMILY: &str = "0 @H@ INDI\n1 NAME Karel /Dvorak/\n1 SEX M\n\
0 @W@ INDI\n1 NAME Marie /Dvorakova/\n1 SEX F\n\
0 @C@ INDI\n1 NAME Josef /Dvorak/\n1 BIRT\n2 DATE 12 JUN 1950\n\
0 @F1@ FAM\n1 HUSB @H@\n1 WIFE @W@\n1 CHIL @C@\n";

// W is a wife in F1 and a daughter in F2.
const TWO_GENERATIONS: &str = "0 @H@ INDI\n1 NAME Karel /Dvorak/\n\
0 @W@ INDI\n1 NAME Marie /Dvorakova/\n\
0 @C@ INDI\n1 NAME Josef /Dvorak/\n1 BIRT\n2 DATE 1950\n\
0 @GF@ INDI\n1 NAME Frantisek /Kral/\n\
0 @GM@ INDI\n1 NAME Ludmila /Kralova/\n\
0 @F1@ FAM\n1 HUSB @H@\n1 WIFE @W@\n1 CHIL @C@\n\
0 @F2@ FAM\n1 HUSB @GF@\n1 WIFE @GM@\n1 CHIL @W@\n";

fn import(conn: &Connection, document: &str) -> TreeId {
    let tree_id = Uuid::new_v4();
    ImportService::new(SqliteFamilyRepository::try_new(conn).unwrap())
        .import_document(document.as_bytes(), tree_id, Uuid::nil())
        .unwrap();
    tree_id
}

fn inference(conn: &Connection) -> InferenceService<SqliteFamilyRepository<'_>> {
    InferenceService::new(SqliteFamilyRepository::try_new(conn).unwrap())
}

fn members(conn: &Connection, tree_id: TreeId) -> Vec<FamilyMember> {
    let repo = SqliteFamilyRepository::try_new(conn).unwrap();
    let ids = repo
        .list_family_records(tree_id)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();
    repo.list_members(&ids).unwrap()
}

fn birth_of(members: &[FamilyMember], source_id: &str) -> Vec<Option<String>> {
    members
        .iter()
        .filter(|member| member.source_individual_id.as_deref() == Some(source_id))
        .map(|member| member.birth_year.clone())
        .collect()
}

#[test]
fn parents_are_derived_from_child_birth() {
    let conn = open_db_in_memory().unwrap();
    let tree_id = import(&conn, SINGLE_FAMILY);

    let report = inference(&conn).run_inference(tree_id).unwrap();
    assert_eq!(report.updated, 2);

    let rows = members(&conn, tree_id);
    assert_eq!(birth_of(&rows, "W"), vec![Some("[1930]".to_string())]);
    assert_eq!(birth_of(&rows, "H"), vec![Some("[1940]".to_string())]);
    assert_eq!(birth_of(&rows, "C"), vec![Some("12 JUN 1950".to_string())]);
}

#[test]
fn rerunning_inference_writes_nothing_new() {
    let conn = open_db_in_memory().unwrap();
    let tree_id = import(&conn, SINGLE_FAMILY);
    let service = inference(&conn);

    service.run_inference(tree_id).unwrap();
    let before = members(&conn, tree_id);
    assert_eq!(service.run_inference(tree_id).unwrap().updated, 0);
    assert_eq!(members(&conn, tree_id), before);
}

#[test]
fn authoritative_values_are_never_overwritten() {
    let conn = open_db_in_memory().unwrap();
    let document = SINGLE_FAMILY.replace(
        "1 NAME Marie /Dvorakova/\n",
        "1 NAME Marie /Dvorakova/\n1 BIRT\n2 DATE BEF ?\n",
    );
    let tree_id = import(&conn, &document);

    let report = inference(&conn).run_inference(tree_id).unwrap();

    let rows = members(&conn, tree_id);
    assert_eq!(birth_of(&rows, "W"), vec![Some("BEF ?".to_string())]);
    // the unreadable wife year still feeds the spouse rule in memory
    assert_eq!(birth_of(&rows, "H"), vec![Some("[1940]".to_string())]);
    assert_eq!(report.updated, 1);
}

#[test]
fn derived_years_propagate_across_families() {
    let conn = open_db_in_memory().unwrap();
    let tree_id = import(&conn, TWO_GENERATIONS);

    inference(&conn).run_inference(tree_id).unwrap();

    let rows = members(&conn, tree_id);
    // wife row in F1 and child row in F2
    assert_eq!(
        birth_of(&rows, "W"),
        vec![Some("[1930]".to_string()), Some("[1930]".to_string())]
    );
    assert_eq!(birth_of(&rows, "GM"), vec![Some("[1910]".to_string())]);
    assert_eq!(birth_of(&rows, "GF"), vec![Some("[1920]".to_string())]);
}

#[test]
fn pass_budget_is_configurable() {
    let conn = open_db_in_memory().unwrap();
    let tree_id = import(&conn, TWO_GENERATIONS);
    let service = InferenceService::with_settings(
        SqliteFamilyRepository::try_new(&conn).unwrap(),
        InferenceSettings {
            passes: 0,
            ..InferenceSettings::default()
        },
    );

    assert_eq!(service.settings().passes, 0);
    assert_eq!(service.run_inference(tree_id).unwrap().updated, 0);
}

#[test]
fn reset_restores_pre_inference_state_and_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let tree_id = import(&conn, TWO_GENERATIONS);
    let service = inference(&conn);
    let imported = members(&conn, tree_id);

    let updated = service.run_inference(tree_id).unwrap().updated;
    assert!(updated > 0);

    let reset = service.reset_inference(tree_id).unwrap();
    assert_eq!(reset.cleared, updated);

    let restored = members(&conn, tree_id);
    let years = |rows: &[FamilyMember]| {
        rows.iter()
            .map(|member| (member.id, member.birth_year.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(years(&restored), years(&imported));

    assert_eq!(service.reset_inference(tree_id).unwrap().cleared, 0);
}

#[test]
fn reset_clears_imputed_death_years_only() {
    let conn = open_db_in_memory().unwrap();
    let document = SINGLE_FAMILY.replace(
        "1 NAME Karel /Dvorak/\n",
        "1 NAME Karel /Dvorak/\n1 DEAT\n2 DATE 1999\n",
    );
    let tree_id = import(&conn, &document);
    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let rows = members(&conn, tree_id);
    let wife = rows
        .iter()
        .find(|member| member.source_individual_id.as_deref() == Some("W"))
        .unwrap();
    repo.update_member_year(wife.id, YearField::Death, "[1990]")
        .unwrap();

    let reset = inference(&conn).reset_inference(tree_id).unwrap();
    assert_eq!(reset.cleared, 1);

    let rows = members(&conn, tree_id);
    let death_of = |source_id: &str| {
        rows.iter()
            .find(|member| member.source_individual_id.as_deref() == Some(source_id))
            .and_then(|member| member.death_year.clone())
    };
    assert_eq!(death_of("W"), None);
    assert_eq!(death_of("H").as_deref(), Some("1999"));
}

#[test]
fn trees_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let first = import(&conn, SINGLE_FAMILY);
    let second = import(&conn, SINGLE_FAMILY);

    inference(&conn).run_inference(first).unwrap();

    let untouched = members(&conn, second);
    assert_eq!(birth_of(&untouched, "W"), vec![None]);
    assert_eq!(birth_of(&untouched, "H"), vec![None]);
}
