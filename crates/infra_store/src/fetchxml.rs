//! FetchXML rendering
//!
//! Turns a [`RecordQuery`] into the FetchXML document the Web API accepts on
//! `GET <entitySet>?fetchXml=...`, with paging attributes on the `<fetch>`
//! element.

use core_kernel::{Condition, ConditionOperator, LinkEntity, RecordQuery};

/// Entity set name for a logical entity name
///
/// `smvs_claim` becomes `smvs_claims`; names already ending in `s` take `es`.
pub fn entity_set_name(logical_name: &str) -> String {
    if logical_name.ends_with('s') {
        format!("{}es", logical_name)
    } else {
        format!("{}s", logical_name)
    }
}

/// Renders one page of `query`
///
/// `page` is 1-based.
pub fn render(query: &RecordQuery, page: u32, count: u32) -> String {
    let mut xml = String::new();
    let distinct = if query.distinct { r#" distinct="true""# } else { "" };
    xml.push_str(&format!(
        r#"<fetch version="1.0" page="{}" count="{}"{}>"#,
        page, count, distinct
    ));
    xml.push_str(&format!(r#"<entity name="{}">"#, escape(&query.entity)));

    for attribute in &query.attributes {
        write_attribute(&mut xml, attribute);
    }
    for order in &query.orders {
        xml.push_str(&format!(
            r#"<order attribute="{}" descending="{}"/>"#,
            escape(&order.attribute),
            order.descending
        ));
    }
    write_filter(&mut xml, &query.conditions);
    for link in &query.links {
        write_link(&mut xml, link);
    }

    xml.push_str("</entity></fetch>");
    xml
}

fn write_attribute(xml: &mut String, attribute: &str) {
    xml.push_str(&format!(r#"<attribute name="{}"/>"#, escape(attribute)));
}

fn write_filter(xml: &mut String, conditions: &[Condition]) {
    if conditions.is_empty() {
        return;
    }
    xml.push_str(r#"<filter type="and">"#);
    for condition in conditions {
        let attribute = escape(&condition.attribute);
        let operator = condition.operator.as_str();
        match condition.operator {
            ConditionOperator::In => {
                xml.push_str(&format!(
                    r#"<condition attribute="{}" operator="{}">"#,
                    attribute, operator
                ));
                for value in &condition.values {
                    xml.push_str(&format!("<value>{}</value>", escape(value)));
                }
                xml.push_str("</condition>");
            }
            ConditionOperator::Eq | ConditionOperator::Gt => {
                let value = condition.values.first().map(String::as_str).unwrap_or_default();
                xml.push_str(&format!(
                    r#"<condition attribute="{}" operator="{}" value="{}"/>"#,
                    attribute,
                    operator,
                    escape(value)
                ));
            }
        }
    }
    xml.push_str("</filter>");
}

fn write_link(xml: &mut String, link: &LinkEntity) {
    let link_type = if link.inner { "inner" } else { "outer" };
    xml.push_str(&format!(
        r#"<link-entity name="{}" from="{}" to="{}" alias="{}" link-type="{}">"#,
        escape(&link.name),
        escape(&link.from),
        escape(&link.to),
        escape(&link.alias),
        link_type
    ));
    for attribute in &link.attributes {
        write_attribute(xml, attribute);
    }
    write_filter(xml, &link.conditions);
    for nested in &link.links {
        write_link(xml, nested);
    }
    xml.push_str("</link-entity>");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_set_name() {
        assert_eq!(entity_set_name("smvs_claim"), "smvs_claims");
        assert_eq!(entity_set_name("smvs_status"), "smvs_statuses");
    }

    #[test]
    fn test_render_paging_and_distinct() {
        let query = RecordQuery::new("smvs_claim").distinct().attribute("smvs_claimid");
        let xml = render(&query, 3, 5000);
        assert!(xml.starts_with(r#"<fetch version="1.0" page="3" count="5000" distinct="true">"#));
        assert!(xml.contains(r#"<entity name="smvs_claim"><attribute name="smvs_claimid"/>"#));
        assert!(xml.ends_with("</entity></fetch>"));
    }

    #[test]
    fn test_render_conditions_and_links() {
        let query = RecordQuery::new("smvs_patient_remittance")
            .condition(Condition::eq("smvs_claim_id", "abc"))
            .condition(Condition::is_in("smvs_remit_type_indicator", [622490001, 622490002]))
            .order_by("smvs_check_processed_date", true)
            .link(
                LinkEntity::inner("smvs_claim_adjustment_detail", "smvs_patient_remittance", "smvs_patient_remittanceid", "cad")
                    .condition(Condition::gt("smvs_amount", 0)),
            );
        let xml = render(&query, 1, 10);

        assert!(xml.contains(r#"<condition attribute="smvs_claim_id" operator="eq" value="abc"/>"#));
        assert!(xml.contains("<value>622490001</value><value>622490002</value>"));
        assert!(xml.contains(r#"<order attribute="smvs_check_processed_date" descending="true"/>"#));
        assert!(xml.contains(r#"alias="cad" link-type="inner">"#));
        assert!(xml.contains(r#"<condition attribute="smvs_amount" operator="gt" value="0"/>"#));
    }

    #[test]
    fn test_render_full_document() {
        let query = RecordQuery::new("smvs_claim_adjustment_detail")
            .attribute("smvs_amount")
            .condition(Condition::is_in("smvs_patient_remittance", ["r1", "r2"]))
            .link(
                LinkEntity::inner("smvs_patient_remittance", "smvs_patient_remittanceid", "smvs_patient_remittance", "rem")
                    .attribute("smvs_remit_type_indicator"),
            );
        assert_eq!(
            render(&query, 2, 50),
            concat!(
                r#"<fetch version="1.0" page="2" count="50">"#,
                r#"<entity name="smvs_claim_adjustment_detail">"#,
                r#"<attribute name="smvs_amount"/>"#,
                r#"<filter type="and"><condition attribute="smvs_patient_remittance" operator="in">"#,
                "<value>r1</value><value>r2</value></condition></filter>",
                r#"<link-entity name="smvs_patient_remittance" from="smvs_patient_remittanceid" to="smvs_patient_remittance" alias="rem" link-type="inner">"#,
                r#"<attribute name="smvs_remit_type_indicator"/>"#,
                "</link-entity></entity></fetch>"
            )
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let query = RecordQuery::new("e").condition(Condition::eq("name", r#"a<b & "c""#));
        let xml = render(&query, 1, 1);
        assert!(xml.contains("a&lt;b &amp; &quot;c&quot;"));
    }
}
