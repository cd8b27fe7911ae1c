//! Project aggregation helpers: cycle detection over project edges.

use std::collections::BTreeMap;

use javelin_util::errors::JavelinError;

/// Detect a cycle in the project aggregation graph.
///
/// `edges` maps a project name to the projects it aggregates. Returns an
/// error naming the cycle path; aggregation cycles are fatal and detected
/// before any resolution starts.
pub fn check_cycles(edges: &BTreeMap<String, Vec<String>>) -> miette::Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        node: &str,
        edges: &BTreeMap<String, Vec<String>>,
        marks: &mut BTreeMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Result<(), Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(node.to_string());
                return Err(cycle);
            }
            None => {}
        }
        marks.insert(node.to_string(), Mark::Visiting);
        stack.push(node.to_string());
        if let Some(children) = edges.get(node) {
            for child in children {
                visit(child, edges, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(node.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    for node in edges.keys() {
        if let Err(cycle) = visit(node, edges, &mut marks, &mut stack) {
            return Err(JavelinError::CyclicProject {
                cycle: cycle.join(" -> "),
            }
            .into());
        }
    }
    Ok(())
}
