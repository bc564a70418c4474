use crate::agent::Agent;

/// Routes a job type to exactly one agent.
///
/// Selection is a linear scan in load order and the first agent declaring the
/// capability wins. When two agents overlap, the earlier-loaded one always
/// takes the job; reordering the catalog changes routing.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    pub fn select(&self, job_type: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.can_handle(job_type))
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Job types no loaded agent can take, in first-seen order.
    pub fn unroutable<'a, I>(&self, job_types: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing: Vec<&str> = Vec::new();
        for job_type in job_types {
            if self.select(job_type).is_none() && !missing.contains(&job_type) {
                missing.push(job_type);
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_matching_agent() {
        let registry = AgentRegistry::new(vec![
            Agent::new("analyst", ["EVALUATE_KPIS"]),
            Agent::new("trainer", ["TRAIN_AGENT"]),
        ]);
        assert_eq!(registry.select("TRAIN_AGENT").unwrap().name, "trainer");
        assert_eq!(registry.select("EVALUATE_KPIS").unwrap().name, "analyst");
    }

    #[test]
    fn no_match_returns_none() {
        let registry = AgentRegistry::new(vec![Agent::new("analyst", ["EVALUATE_KPIS"])]);
        assert!(registry.select("EXECUTE_PLAY_SEO").is_none());
        assert!(AgentRegistry::default().select("EVALUATE_KPIS").is_none());
    }

    #[test]
    fn first_loaded_agent_wins_on_overlap() {
        let first = Agent::new("first", ["X", "Y"]);
        let second = Agent::new("second", ["X"]);

        let registry = AgentRegistry::new(vec![first.clone(), second.clone()]);
        assert_eq!(registry.select("X").unwrap().name, "first");

        let reordered = AgentRegistry::new(vec![second, first]);
        assert_eq!(reordered.select("X").unwrap().name, "second");
        assert_eq!(reordered.select("Y").unwrap().name, "first");
    }

    #[test]
    fn selection_is_deterministic() {
        let registry = AgentRegistry::new(vec![Agent::new("a", ["X"]), Agent::new("b", ["X"])]);
        for _ in 0..10 {
            assert_eq!(registry.select("X").unwrap().name, "a");
        }
    }

    #[test]
    fn reports_unroutable_types_once() {
        let registry = AgentRegistry::new(vec![Agent::new("a", ["X"])]);
        assert_eq!(registry.unroutable(["X", "Y", "Z", "Y"]), vec!["Y", "Z"]);
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
