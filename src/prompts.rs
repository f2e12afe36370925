//! Extraction instruction sent to the vision model.
//!
//! Callers can override it via [`crate::config::ServiceConfig::instruction`];
//! the constant here is used only when no override is provided. The JSON
//! shape it requests must stay in sync with
//! [`crate::pipeline::normalize::REQUIRED_SECTIONS`].

/// Default instruction for extracting a Hebrew invoice into JSON.
pub const EXTRACTION_PROMPT: &str = r#"Analyze this Hebrew invoice image and extract the data into a JSON object with PRECISE field mapping.

1. RTL COLUMN ORDER
   Hebrew invoices are read RIGHT to LEFT. Line-item columns appear in this order:
   [תיאור] ➔ [כמות] ➔ [מחיר יחידה] ➔ [סה"כ]
   [Description] ➔ [Quantity] ➔ [Unit Price] ➔ [Total]

2. COLUMN HEADERS
   - תיאור / פריט / שם פריט = Description
   - כמות = Quantity
   - מחיר / מחיר יחידה = Unit Price
   - סה"כ / סכום = Total

3. QUANTITY vs TOTAL
   - Quantity is ALWAYS the SMALLER number, usually below 100
   - Total is ALWAYS the LARGER number and equals quantity × price
   - Example: price 160.00 with numbers 2.20 and 352.00 → quantity 2.20, total 352.00
   - Example: price 38.00 with numbers 266.00 and 7.00 → quantity 7.00, total 266.00

4. VALIDATION
   - Verify total = quantity × price for every row
   - If it does not match, the columns were mapped wrong; fix the mapping
   - Subtotal = sum of line totals, tax = 17% of subtotal, total = subtotal + tax

5. OUTPUT FORMAT
   - Output ONLY the JSON object, no commentary, no markdown fences
   - Numbers must be JSON numbers, not strings
   - No null, None or undefined values; use "" or 0 instead

Return this exact JSON structure:
{
    "company_details": {
        "name": "",
        "address": "",
        "tax_id": ""
    },
    "invoice_details": {
        "invoice_number": "",
        "date": ""
    },
    "line_items": [
        {
            "item_code": "",
            "description": "",
            "quantity": 0,
            "price": 0,
            "total": 0
        }
    ],
    "totals": {
        "subtotal": 0,
        "tax": 0,
        "total": 0
    }
}"#;
