use loandoc_structurer::{
    apply_edits, structure_text, summarize_edits, validate_edits, EditAction, EditError,
    ProposalEdit, SectionKind, MIME_PDF, PARAGRAPH_SEPARATOR,
};

fn sample_document() -> loandoc_structurer::StructuredDocument {
    let raw = "1. Definitions\n\n\"Facility\" means the term loan facility made available under this Agreement.\n\n2. The Facility\n\nSubject to the terms of this Agreement, the Lenders make available the Facility.";
    structure_text(raw, "agreement.txt", MIME_PDF)
}

fn edit(section_id: &str, action: EditAction, original: &str, proposed: &str, order: i64) -> ProposalEdit {
    ProposalEdit {
        section_id: section_id.to_string(),
        action,
        original_text: original.to_string(),
        proposed_text: proposed.to_string(),
        order,
    }
}

#[test]
fn validate_reports_unknown_section() {
    let doc = sample_document();
    let errors = validate_edits(
        &doc,
        &[edit("section-999999", EditAction::Replace, "x", "y", 0)],
    );
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        EditError::SectionNotFound { section_id, order: 0 } if section_id == "section-999999"
    ));
}

#[test]
fn validate_reports_stale_edit() {
    let doc = sample_document();
    let target = &doc.sections[0];
    let errors = validate_edits(
        &doc,
        &[edit(
            &target.id,
            EditAction::Replace,
            "1. Interpretation",
            "1. Construction",
            0,
        )],
    );
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        EditError::StaleEdit {
            section_id,
            expected,
            found,
        } => {
            assert_eq!(section_id, &target.id);
            assert_eq!(expected, "1. Interpretation");
            assert_eq!(found, "1. Definitions");
        }
        other => panic!("expected stale edit, got {:?}", other),
    }
}

#[test]
fn validate_reports_missing_proposed_text() {
    let doc = sample_document();
    let target = &doc.sections[0];
    let errors = validate_edits(
        &doc,
        &[edit(&target.id, EditAction::Modify, &target.content, "", 0)],
    );
    assert!(errors
        .iter()
        .any(|e| matches!(e, EditError::MissingProposedText { section_id } if section_id == &target.id)));
}

#[test]
fn validate_allows_empty_text_for_delete() {
    let doc = sample_document();
    let target = &doc.sections[0];
    let errors = validate_edits(
        &doc,
        &[edit(&target.id, EditAction::Delete, &target.content, "", 0)],
    );
    assert!(errors.is_empty());
}

#[test]
fn replace_updates_content_and_offsets() {
    let doc = sample_document();
    let target = doc.sections[1].clone();
    let updated = apply_edits(
        &doc,
        &[edit(
            &target.id,
            EditAction::Replace,
            &target.content,
            "\"Facility\" means the revolving credit facility made available under this Agreement.",
            0,
        )],
    );
    assert!(updated.full_text.contains("revolving credit facility"));
    assert!(!updated.full_text.contains("term loan facility made available"));
    // kind untouched, offsets rewalked
    assert_eq!(updated.sections[1].kind, target.kind);
    for pair in updated.sections.windows(2) {
        assert_eq!(pair[0].end_position + 2, pair[1].start_position);
    }
    let joined: Vec<&str> = updated.sections.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(updated.full_text, joined.join(PARAGRAPH_SEPARATOR));
    // the input document is a value, not mutated in place
    assert!(doc.full_text.contains("term loan facility"));
}

#[test]
fn delete_removes_and_reindexes_positional_ids() {
    let doc = sample_document();
    let target = doc.sections[0].clone();
    let updated = apply_edits(
        &doc,
        &[edit(&target.id, EditAction::Delete, &target.content, "", 0)],
    );
    assert_eq!(updated.sections.len(), doc.sections.len() - 1);
    for (i, s) in updated.sections.iter().enumerate() {
        assert_eq!(s.order, i);
        assert_eq!(s.id, format!("section-{:06}", i));
    }
    assert!(!updated.full_text.contains("1. Definitions"));
    assert_eq!(updated.metadata.total_sections, updated.sections.len());
    assert_eq!(updated.metadata.total_characters, updated.full_text.len());
}

#[test]
fn insert_creates_synthetic_section_after_target() {
    let doc = sample_document();
    let target = doc.sections[0].clone();
    let updated = apply_edits(
        &doc,
        &[edit(
            &target.id,
            EditAction::Insert,
            &target.content,
            "1A. Interpretation",
            0,
        )],
    );
    assert_eq!(updated.sections.len(), doc.sections.len() + 1);
    let inserted = &updated.sections[1];
    assert!(inserted.id.starts_with("section-inserted-"));
    assert_eq!(inserted.content, "1A. Interpretation");
    // inherits the target's kind
    assert!(matches!(inserted.kind, SectionKind::Clause { .. }));
    assert_eq!(inserted.order, 1);
    // positional ids around it are re-derived; the synthetic id is kept
    assert_eq!(updated.sections[0].id, "section-000000");
    assert_eq!(updated.sections[2].id, "section-000002");
}

#[test]
fn inserted_ids_stay_unique_across_batches() {
    let doc = sample_document();
    let target_id = doc.sections[0].id.clone();
    // two separate batches applied back to back, as a store draining
    // accepted proposals would
    let once = apply_edits(
        &doc,
        &[edit(&target_id, EditAction::Insert, "", "1A. Interpretation", 0)],
    );
    let twice = apply_edits(
        &once,
        &[edit(&target_id, EditAction::Insert, "", "1B. Construction", 0)],
    );

    let mut ids: Vec<&str> = twice.sections.iter().map(|s| s.id.as_str()).collect();
    ids.sort();
    let total = ids.len();
    ids.dedup();
    assert_eq!(ids.len(), total, "section ids must be unique: {:?}", ids);
    let synthetic = twice
        .sections
        .iter()
        .filter(|s| s.id.starts_with("section-inserted-"))
        .count();
    assert_eq!(synthetic, 2);
}

#[test]
fn insert_survives_delete_of_its_anchor() {
    let doc = sample_document();
    let target = doc.sections[0].clone();
    let updated = apply_edits(
        &doc,
        &[
            edit(&target.id, EditAction::Delete, &target.content, "", 1),
            edit(
                &target.id,
                EditAction::Insert,
                &target.content,
                "1. Definitions and Interpretation",
                0,
            ),
        ],
    );
    assert!(updated
        .sections
        .iter()
        .any(|s| s.content == "1. Definitions and Interpretation"));
    assert!(!updated
        .sections
        .iter()
        .any(|s| s.content == "1. Definitions"));
}

#[test]
fn edits_against_unknown_sections_are_skipped() {
    let doc = sample_document();
    let updated = apply_edits(
        &doc,
        &[edit("section-999999", EditAction::Delete, "x", "", 0)],
    );
    assert_eq!(updated.sections.len(), doc.sections.len());
    assert_eq!(updated.full_text, doc.full_text);
}

#[test]
fn version_is_not_incremented_by_edit_application() {
    let doc = sample_document();
    let target = doc.sections[0].clone();
    let updated = apply_edits(
        &doc,
        &[edit(
            &target.id,
            EditAction::Modify,
            &target.content,
            "1. Definitions (amended)",
            0,
        )],
    );
    assert_eq!(updated.version, doc.version);
}

#[test]
fn summarize_counts_by_action() {
    let summary = summarize_edits(&[
        edit("a", EditAction::Insert, "", "x", 0),
        edit("b", EditAction::Delete, "y", "", 1),
        edit("c", EditAction::Replace, "y", "z", 2),
        edit("d", EditAction::Modify, "y", "z", 3),
    ]);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.modified, 2);
    assert_eq!(summary.total, 4);
}
