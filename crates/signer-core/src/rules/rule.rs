//! A named, chain-gated list of conditions, and the ordered rule set that
//! the request orchestrator matches a signing request against (spec §4.4).

use serde::Deserialize;

use crate::rules::condition::{Condition, RawCondition};
use crate::tx::Transaction;

#[derive(Debug, Deserialize)]
struct RawRule {
    name: String,
    chain_id: u64,
    conditions: Vec<RawCondition>,
}

pub struct Rule {
    pub name: String,
    pub chain_id: u64,
    conditions: Vec<Condition>,
}

impl Rule {
    fn compile(raw: RawRule) -> Self {
        Rule {
            name: raw.name,
            chain_id: raw.chain_id,
            conditions: raw.conditions.into_iter().map(Condition::compile).collect(),
        }
    }

    /// A rule with zero conditions matches vacuously (spec §8 invariant 2).
    fn all_conditions_match(&self, eval: impl Fn(&Condition) -> bool) -> bool {
        self.conditions.iter().all(eval)
    }
}

/// The immutable, load-ordered rule list.
pub struct Rules(Vec<Rule>);

impl Rules {
    pub fn load(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Vec<RawRule> = serde_json::from_str(json)?;
        Ok(Rules(raw.into_iter().map(Rule::compile).collect()))
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Rules(rules)
    }

    /// First rule (in declared order) whose `chain_id` matches and whose
    /// conditions all hold, evaluated against a normalized transaction.
    /// Transactions on a non-matching chain never match, regardless of
    /// conditions (spec §8 invariant 1).
    pub fn matched_for_transaction(&self, chain_id: u64, tx: &Transaction) -> Option<&Rule> {
        self.0
            .iter()
            .find(|r| r.chain_id == chain_id && r.all_conditions_match(|c| c.is_match_tx(tx)))
    }

    pub fn matched_for_message(&self, chain_id: u64, message: &str) -> Option<&Rule> {
        self.0.iter().find(|r| {
            r.chain_id == chain_id && r.all_conditions_match(|c| c.is_match_message(message))
        })
    }

    pub fn matched_for_eip712(
        &self,
        chain_id: u64,
        typed_data: &serde_json::Value,
    ) -> Option<&Rule> {
        self.0.iter().find(|r| {
            r.chain_id == chain_id && r.all_conditions_match(|c| c.is_match_eip712(typed_data))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::RawTransaction;

    fn tx_to(addr: &str, chain_id: u64) -> Transaction {
        let raw = RawTransaction {
            tx_type: "0".into(),
            chain_id: chain_id.to_string(),
            nonce: "0".into(),
            from: "".into(),
            to: addr.into(),
            value: "0".into(),
            gas: "21000".into(),
            gas_price: "0".into(),
            max_priority_fee_per_gas: "".into(),
            max_fee_per_gas: "".into(),
            input: "0x".into(),
            access_list: vec![],
        };
        Transaction::normalize(&raw, chain_id).unwrap()
    }

    const RULE_JSON: &str = r#"[
        {
            "name": "allow-to",
            "chain_id": 1,
            "conditions": [
                {"field": "to", "symbol": "==", "value": "0x1111111111111111111111111111111111111111"}
            ]
        }
    ]"#;

    #[test]
    fn matches_on_correct_chain_and_condition() {
        let rules = Rules::load(RULE_JSON).unwrap();
        let tx = tx_to("0x1111111111111111111111111111111111111111", 1);
        assert!(rules.matched_for_transaction(1, &tx).is_some());
    }

    #[test]
    fn never_matches_wrong_chain_regardless_of_conditions() {
        let rules = Rules::load(RULE_JSON).unwrap();
        let tx = tx_to("0x1111111111111111111111111111111111111111", 2);
        assert!(rules.matched_for_transaction(2, &tx).is_none());
    }

    #[test]
    fn empty_rule_set_rejects_everything() {
        let rules = Rules::load("[]").unwrap();
        let tx = tx_to("0x1111111111111111111111111111111111111111", 1);
        assert!(rules.matched_for_transaction(1, &tx).is_none());
    }

    #[test]
    fn zero_conditions_match_vacuously() {
        let rules = Rules::load(
            r#"[{"name":"any","chain_id":1,"conditions":[]}]"#,
        )
        .unwrap();
        let tx = tx_to("0x0000000000000000000000000000000000000000", 1);
        assert!(rules.matched_for_transaction(1, &tx).is_some());
    }

    #[test]
    fn first_match_wins() {
        let rules = Rules::load(
            r#"[
                {"name":"first","chain_id":1,"conditions":[]},
                {"name":"second","chain_id":1,"conditions":[]}
            ]"#,
        )
        .unwrap();
        let tx = tx_to("0x0000000000000000000000000000000000000000", 1);
        assert_eq!(rules.matched_for_transaction(1, &tx).unwrap().name, "first");
    }
}
