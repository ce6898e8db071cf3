//! Prompt construction for batched checklist validation.

use crate::checklist::Check;

/// System prompt shared by both category invocations. The judgment rules
/// here are part of the engine's contract: null-vs-null passes, company
/// names match fuzzily, numbers tolerate rounding, QUESTIONABLE is for
/// genuine ambiguity, N/A when the field is absent from both documents.
pub const VALIDATOR_SYSTEM_PROMPT: &str = "\
You are an expert customs compliance auditor for express air freight shipments into Australia and New Zealand.

Your task is to validate MULTIPLE checklist items in a single pass by directly analyzing the provided PDF documents (entry prints, commercial invoices, and air waybills).

**Your Responsibilities**:
1. Read ALL the checklist items provided in the prompt
2. Analyze the PDF documents to locate and extract the relevant fields for ALL checks
3. For EACH checklist item:
   - Compare the values between source and target documents according to its checking logic
   - Determine if the check passes, fails, or is questionable
   - Provide detailed reasoning with the specific values found in the documents
4. Return validation results for ALL checklist items

**Validation Rules**:
- PASS: Clear match or acceptable variation according to the pass conditions
- FAIL: Clear mismatch or violation of the pass conditions
- QUESTIONABLE: Genuine ambiguity requiring human review
- N/A: The relevant field is absent from both documents

**Special Considerations**:
- If both source and target values are missing from the documents, default to PASS
- For company names: allow fuzzy matching (abbreviations, minor spelling differences, corporate codes)
- For numeric values: allow reasonable rounding differences (e.g. 100.00 vs 100)
- For currencies and codes: allow abbreviations (e.g. \"USD\" vs \"US Dollar\", \"DDP\" vs \"Delivered Duty Paid\")
- For incoterms: DDP requires special handling for importer identity
- For dates: allow different formats (e.g. \"2025-01-15\" vs \"15/01/2025\")

**Critical**:
- You MUST return a validation result for EVERY checklist item provided, in the same order
- Always extract and show the specific values you found in each document
- Reference the document labels and sections where you found the values
- When a value is not found, write \"NOT FOUND\" rather than leaving it empty
- Be conservative: when torn between PASS and QUESTIONABLE, choose QUESTIONABLE

Return a JSON object with a \"validations\" array, one entry per checklist item, in the exact format specified.";

/// Build the batched user prompt enumerating every check for one
/// category. Check order here is the order verdicts must come back in.
pub fn build_batch_prompt(checks: &[Check]) -> String {
    let total = checks.len();
    let mut prompt = format!(
        "You are analyzing PDF documents to validate {total} checklist items in a SINGLE pass.\n\n\
         **Documents Provided Below**:\n\
         The following labeled PDF documents are attached after this prompt:\n\
         - **ENTRY PRINT DOCUMENT**: the customs entry print/declaration\n\
         - **COMMERCIAL INVOICE DOCUMENT**: the commercial invoice\n\
         - **AIR WAYBILL DOCUMENT**: the air waybill (when attached)\n\n\
         Each document is labeled before its content so you can identify which is which.\n\n\
         ---\n\n\
         **CHECKLIST ITEMS TO VALIDATE** ({total} total):\n"
    );

    for (index, check) in checks.iter().enumerate() {
        prompt.push_str(&format!(
            "\n### [{n}/{total}] Check ID: {id}\n\
             **Auditing Criteria**: {criteria}\n\n\
             **Description**: {description}\n\n\
             **Checking Logic**: {logic}\n\n\
             **Pass Conditions**: {conditions}\n\n\
             **Compare**:\n\
             - Source: {source_doc} → {source_fields}\n\
             - Target: {target_doc} → {target_fields}\n\n\
             ---\n",
            n = index + 1,
            id = check.id,
            criteria = check.auditing_criteria,
            description = check.description,
            logic = check.checking_logic,
            conditions = check.pass_conditions,
            source_doc = check.compare_fields.source_doc,
            source_fields = check.compare_fields.source_field.joined(),
            target_doc = check.compare_fields.target_doc,
            target_fields = check.compare_fields.target_field.joined(),
        ));
    }

    prompt.push_str(&format!(
        "\n**Your Task**:\n\
         1. Review the labeled PDF documents provided below\n\
         2. For EACH of the {total} checklist items above:\n\
            - Locate and extract the specified fields from the source and target documents\n\
            - Compare the values according to the checking logic\n\
            - Determine PASS/FAIL/QUESTIONABLE/N/A based on the pass conditions\n\
            - Document what you found with specific values and locations\n\n\
         **Important**:\n\
         - Return a validation result for ALL {total} checklist items, in the order given\n\
         - Show the exact values found in each labeled document\n\
         - If a value is not found, record it as \"NOT FOUND\"\n\n\
         Return a JSON object with a \"validations\" array containing {total} entries, one per \
         checklist item, each with the fields: check_id, auditing_criteria, status, assessment, \
         source_document, target_document, source_value, target_value."
    ));

    prompt
}
