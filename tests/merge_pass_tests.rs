use loandoc_structurer::{structure_text, SectionKind, MIME_PDF};

#[test]
fn section_marker_merges_with_following_title() {
    let raw = "SECTION 2\n\nUTILISATION\n\n5.1 The Borrower may deliver a Utilisation Request.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    let heading = &doc.sections[0];
    assert_eq!(heading.content, "SECTION 2 \u{2014} UTILISATION");
    match &heading.kind {
        SectionKind::Heading {
            level,
            clause_number,
        } => {
            assert_eq!(*level, 1);
            assert_eq!(clause_number.as_deref(), Some("2"));
        }
        other => panic!("expected heading, got {:?}", other),
    }
}

#[test]
fn bare_clause_numeral_merges_with_following_title() {
    let raw = "10.\n\nREPAYMENT\n\nThe Borrower shall repay the Loans in full on the Termination Date.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    let clause = &doc.sections[0];
    assert_eq!(clause.content, "10. REPAYMENT");
    match &clause.kind {
        SectionKind::Clause {
            clause_number,
            parent,
        } => {
            assert_eq!(clause_number, "10");
            assert_eq!(*parent, None);
        }
        other => panic!("expected clause, got {:?}", other),
    }
}

#[test]
fn bare_clause_numeral_merges_with_following_text() {
    let raw = "8.2\n\nDefault interest accrues on overdue amounts at two per cent above the normal rate.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert_eq!(doc.sections.len(), 1);
    match &doc.sections[0].kind {
        SectionKind::Clause {
            clause_number,
            parent,
        } => {
            assert_eq!(clause_number, "8.2");
            assert_eq!(parent.as_deref(), Some("8"));
        }
        other => panic!("expected clause, got {:?}", other),
    }
    assert!(doc.sections[0].content.starts_with("8.2 Default interest"));
}

#[test]
fn bare_list_marker_merges_with_following_text() {
    let raw = "(a)\n\nit is duly incorporated and validly existing under the law of its jurisdiction.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert_eq!(doc.sections.len(), 1);
    assert!(matches!(doc.sections[0].kind, SectionKind::ListItem {}));
    assert_eq!(
        doc.sections[0].content,
        "(a) it is duly incorporated and validly existing under the law of its jurisdiction."
    );
}

#[test]
fn split_list_item_text_reattaches() {
    let raw = "(a) pay the fees set out in each Fee Letter;\n\nand indemnify the Agent against any loss.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert_eq!(doc.sections.len(), 1);
    assert!(matches!(doc.sections[0].kind, SectionKind::ListItem {}));
    assert!(doc.sections[0]
        .content
        .ends_with("and indemnify the Agent against any loss."));
}

#[test]
fn unrelated_paragraph_does_not_reattach_to_list_item() {
    let raw = "(a) pay the fees set out in each Fee Letter.\n\nThe Agent shall notify the Borrower promptly.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert_eq!(doc.sections.len(), 2);
    assert!(matches!(doc.sections[1].kind, SectionKind::Paragraph {}));
}

#[test]
fn single_caps_word_heading_downgrades_to_paragraph() {
    let raw = "GUARANTEE\n\nEach Guarantor irrevocably guarantees punctual performance by each Borrower.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert!(matches!(doc.sections[0].kind, SectionKind::Paragraph {}));
}

#[test]
fn standard_section_title_survives_downgrade() {
    let raw = "FEES\n\n11.1 The Borrower shall pay the Agent an agency fee.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert!(matches!(
        doc.sections[0].kind,
        SectionKind::Heading { level: 3, .. }
    ));
    assert_eq!(doc.sections[0].content, "FEES");
}

#[test]
fn page_reference_fragments_are_dropped() {
    let raw = ".4\n\n4. Conditions precedent must be satisfied before the first Utilisation.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    assert_eq!(doc.sections.len(), 1);
    assert!(doc.sections[0].content.starts_with("4. Conditions precedent"));
}

#[test]
fn ids_and_order_are_rederived_after_merging() {
    let raw = ".12\n\nSECTION 3\n\nINTEREST\n\n9.\n\nInterest on each Loan accrues daily.";
    let doc = structure_text(raw, "doc.txt", MIME_PDF);
    // noise dropped, two merges applied: heading + clause remain
    assert_eq!(doc.sections.len(), 2);
    assert_eq!(doc.sections[0].id, "section-000000");
    assert_eq!(doc.sections[1].id, "section-000001");
    assert_eq!(doc.sections[0].order, 0);
    assert_eq!(doc.sections[1].order, 1);
}
