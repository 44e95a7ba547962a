//! Instruction sent alongside every receipt document

pub const EXTRACTION_PROMPT: &str = r#"Analyze this receipt and extract all information in JSON format.

Return ONLY valid JSON matching this exact structure:
{
  "store_name": "Store name (e.g., Costco)",
  "store_location": "Full location from receipt",
  "purchase_date": "YYYY-MM-DD format",
  "subtotal": 0.00,
  "tax": 0.00,
  "total": 0.00,
  "item_count": 0,
  "line_items": [
    {
      "item_code": "Product code or null if not present",
      "raw_description": "Exactly as shown on receipt",
      "normalized_name": "Human-readable product name",
      "category": "Main category (Grocery, Household, Pet, Personal Care, Baby, Electronics, Automotive, Other)",
      "subcategory": "Subcategory (e.g., Produce, Dairy, Meat, Cleaning, Paper Goods)",
      "quantity": 1,
      "total_price": 0.00,
      "is_taxable": false,
      "is_discount": false
    }
  ]
}

Rules:
- For Costco receipts: "N" suffix means non-taxable (food), "Y" means taxable
- Discount lines have negative prices and is_discount: true
- item_code is the number like "57554" or "1048072"
- normalized_name should be clear: "KS TOWEL" → "Kirkland Signature Paper Towels"
- Return ONLY the JSON, no markdown, no explanation"#;
