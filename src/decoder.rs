//! Conversion between raw assignments and ordered routes.
//!
//! Two raw layouts are supported:
//!
//! - **positions**: for each courier, the location held by every slot, with
//!   packages `0..n` and the depot `n` (the layout built by
//!   [`crate::model::ModelBuilder`]);
//! - **successors**: for each courier, a 1-based array of length `n + 1`
//!   where entry `j` is the node visited after node `j`, the depot is `n + 1`
//!   and nodes the courier does not visit point to themselves.
//!
//! Routes are always returned as 1-based package IDs in visit order. Every
//! decoder rejects assignments that do not describe valid routes instead of
//! repairing them.

use crate::error::{McpError, Result};

/// Decode a slot matrix into routes.
///
/// Checks the depot at both ends of every row, that a courier never leaves
/// the depot again once back, that every value is a location, and that every
/// package is delivered exactly once.
pub fn decode_positions(slots: &[Vec<i64>], n: usize) -> Result<Vec<Vec<usize>>> {
    let depot = n as i64;
    let mut delivered = vec![false; n];
    let mut routes = Vec::with_capacity(slots.len());

    for (i, row) in slots.iter().enumerate() {
        if row.len() < 2 {
            return Err(McpError::MalformedAssignment(format!(
                "courier {} has {} slots, expected at least 2",
                i + 1,
                row.len()
            )));
        }
        let last = row.len() - 1;
        if row[0] != depot || row[last] != depot {
            return Err(McpError::MalformedAssignment(format!(
                "courier {} does not start and end at the depot",
                i + 1
            )));
        }

        let mut route = Vec::new();
        let mut returned = false;
        for (k, &value) in row.iter().enumerate().take(last).skip(1) {
            if value < 0 || value > depot {
                return Err(McpError::MalformedAssignment(format!(
                    "courier {} slot {} holds {}, outside [0, {}]",
                    i + 1,
                    k,
                    value,
                    n
                )));
            }
            if value == depot {
                returned = true;
                continue;
            }
            if returned {
                return Err(McpError::MalformedAssignment(format!(
                    "courier {} leaves the depot again at slot {}",
                    i + 1,
                    k
                )));
            }
            let package = value as usize;
            if delivered[package] {
                return Err(McpError::MalformedAssignment(format!(
                    "package {} delivered twice",
                    package + 1
                )));
            }
            delivered[package] = true;
            route.push(package + 1);
        }
        routes.push(route);
    }

    if let Some(missing) = delivered.iter().position(|&d| !d) {
        return Err(McpError::MalformedAssignment(format!(
            "package {} is never delivered",
            missing + 1
        )));
    }
    Ok(routes)
}

/// Decode successor arrays into routes by following each courier's cycle
/// from the depot.
///
/// An identity array is an idle courier. The walk is bounded by `n + 1`
/// steps; running past it, a visited node that points nowhere valid, a node
/// outside the route that is not a self-loop (a sub-cycle that misses the
/// depot), and a package claimed by two couriers are all rejected.
pub fn decode_successors(lists: &[Vec<usize>]) -> Result<Vec<Vec<usize>>> {
    let Some(first) = lists.first() else {
        return Ok(Vec::new());
    };
    if first.is_empty() {
        return Err(McpError::MalformedAssignment("empty successor list".into()));
    }
    let n = first.len() - 1;
    let depot = n + 1;
    let mut owner: Vec<Option<usize>> = vec![None; n + 1];
    let mut routes = Vec::with_capacity(lists.len());

    for (i, list) in lists.iter().enumerate() {
        if list.len() != n + 1 {
            return Err(McpError::MalformedAssignment(format!(
                "courier {} has a successor list of length {}, expected {}",
                i + 1,
                list.len(),
                n + 1
            )));
        }
        if let Some(bad) = list.iter().find(|&&next| next == 0 || next > depot) {
            return Err(McpError::MalformedAssignment(format!(
                "courier {} has successor {} outside [1, {}]",
                i + 1,
                bad,
                depot
            )));
        }
        if list.iter().enumerate().all(|(k, &next)| next == k + 1) {
            routes.push(Vec::new());
            continue;
        }

        let mut on_route = vec![false; n + 1];
        let mut route = Vec::new();
        let mut current = depot;
        let mut steps = 0;
        loop {
            let next = list[current - 1];
            if next == depot {
                break;
            }
            steps += 1;
            if steps > n || on_route[next] {
                return Err(McpError::MalformedAssignment(format!(
                    "courier {} does not return to the depot within {} steps",
                    i + 1,
                    n + 1
                )));
            }
            on_route[next] = true;
            route.push(next);
            current = next;
        }

        for node in 1..=n {
            if !on_route[node] && list[node - 1] != node {
                return Err(McpError::MalformedAssignment(format!(
                    "courier {} has a sub-cycle through {} that misses the depot",
                    i + 1,
                    node
                )));
            }
        }
        for &package in &route {
            if let Some(other) = owner[package] {
                return Err(McpError::MalformedAssignment(format!(
                    "package {} claimed by couriers {} and {}",
                    package,
                    other + 1,
                    i + 1
                )));
            }
            owner[package] = Some(i);
        }
        routes.push(route);
    }
    Ok(routes)
}

/// Lay routes out as slot rows of length `slot_bound + 1`.
pub fn encode_positions(routes: &[Vec<usize>], n: usize, slot_bound: usize) -> Result<Vec<Vec<i64>>> {
    routes
        .iter()
        .enumerate()
        .map(|(i, route)| {
            if route.len() + 1 > slot_bound {
                return Err(McpError::MalformedAssignment(format!(
                    "courier {} has {} stops but only {} interior slots",
                    i + 1,
                    route.len(),
                    slot_bound.saturating_sub(1)
                )));
            }
            let mut row = vec![n as i64; slot_bound + 1];
            for (k, &stop) in route.iter().enumerate() {
                if stop == 0 || stop > n {
                    return Err(McpError::MalformedAssignment(format!("unknown package {}", stop)));
                }
                row[k + 1] = stop as i64 - 1;
            }
            Ok(row)
        })
        .collect()
}

/// Lay routes out as 1-based successor arrays.
pub fn encode_successors(routes: &[Vec<usize>], n: usize) -> Result<Vec<Vec<usize>>> {
    let depot = n + 1;
    routes
        .iter()
        .map(|route| {
            let mut list: Vec<usize> = (1..=depot).collect();
            let mut previous = depot;
            for &stop in route {
                if stop == 0 || stop > n {
                    return Err(McpError::MalformedAssignment(format!("unknown package {}", stop)));
                }
                list[previous - 1] = stop;
                previous = stop;
            }
            if !route.is_empty() {
                list[previous - 1] = depot;
            }
            Ok(list)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_positions() {
        // n = 3, depot = 3
        let slots = vec![vec![3, 0, 2, 3, 3], vec![3, 1, 3, 3, 3]];
        let routes = decode_positions(&slots, 3).unwrap();
        assert_eq!(routes, vec![vec![1, 3], vec![2]]);
    }

    #[test]
    fn test_decode_positions_idle_courier() {
        let slots = vec![vec![3, 3, 3, 3, 3], vec![3, 2, 1, 0, 3]];
        let routes = decode_positions(&slots, 3).unwrap();
        assert!(routes[0].is_empty());
        assert_eq!(routes[1], vec![3, 2, 1]);
    }

    #[test]
    fn test_decode_positions_rejects_bad_rows() {
        let cases = vec![
            vec![vec![0, 1, 2, 3]],       // starts away from the depot
            vec![vec![3, 0, 3, 1, 3]],    // leaves again
            vec![vec![3, 0, 0, 1, 2, 3]], // duplicate
            vec![vec![3, 0, 1, 3]],       // package 3 missing
            vec![vec![3, 0, 1, 7, 3]],    // out of range
            vec![vec![3]],                // too short
        ];
        for slots in cases {
            assert!(
                matches!(decode_positions(&slots, 3), Err(McpError::MalformedAssignment(_))),
                "{:?}",
                slots
            );
        }
    }

    #[test]
    fn test_decode_successors() {
        // n = 3, depot = 4: courier 1 goes 4 -> 2 -> 1 -> 4, courier 2 goes 4 -> 3 -> 4
        let lists = vec![vec![4, 1, 3, 2], vec![1, 2, 4, 3]];
        let routes = decode_successors(&lists).unwrap();
        assert_eq!(routes, vec![vec![2, 1], vec![3]]);
    }

    #[test]
    fn test_decode_successors_identity_is_idle() {
        let lists = vec![vec![1, 2, 3, 4], vec![2, 3, 4, 1]];
        let routes = decode_successors(&lists).unwrap();
        assert!(routes[0].is_empty());
        assert_eq!(routes[1], vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_successors_detects_sub_cycle() {
        // depot -> 1 -> depot, plus 2 <-> 3 never reaching the depot
        let lists = vec![vec![4, 3, 2, 1]];
        let err = decode_successors(&lists).unwrap_err();
        assert!(matches!(err, McpError::MalformedAssignment(_)));
        assert!(err.to_string().contains("sub-cycle"));
    }

    #[test]
    fn test_decode_successors_detects_loop_without_depot() {
        // depot -> 1 -> 2 -> 1 -> ... never returns
        let lists = vec![vec![2, 1, 3, 1]];
        assert!(matches!(decode_successors(&lists), Err(McpError::MalformedAssignment(_))));
    }

    #[test]
    fn test_decode_successors_rejects_double_claim() {
        let lists = vec![vec![4, 2, 3, 1], vec![4, 2, 3, 1]];
        let err = decode_successors(&lists).unwrap_err();
        assert!(err.to_string().contains("claimed by couriers 1 and 2"));
    }

    #[test]
    fn test_decode_successors_rejects_bad_values() {
        assert!(decode_successors(&[vec![0, 2, 3]]).is_err());
        assert!(decode_successors(&[vec![1, 2, 3], vec![1, 2]]).is_err());
        assert!(decode_successors(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decoding_is_idempotent() {
        let lists = vec![vec![3, 1, 5, 4, 2], vec![1, 2, 3, 5, 4]];
        let first = decode_successors(&lists).unwrap();
        let second = decode_successors(&lists).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![vec![2, 1, 3], vec![4]]);
    }

    #[test]
    fn test_encoders_invert_decoders() {
        let routes = vec![vec![2, 4], vec![], vec![1, 3]];
        let slots = encode_positions(&routes, 4, 3).unwrap();
        assert_eq!(slots[1], vec![4, 4, 4, 4]);
        assert_eq!(decode_positions(&slots, 4).unwrap(), routes);

        let lists = encode_successors(&routes, 4).unwrap();
        assert_eq!(lists[1], vec![1, 2, 3, 4, 5]);
        assert_eq!(decode_successors(&lists).unwrap(), routes);
    }

    #[test]
    fn test_encode_positions_too_many_stops() {
        assert!(encode_positions(&[vec![1, 2, 3]], 3, 3).is_err());
        assert!(encode_positions(&[vec![5]], 3, 3).is_err());
    }
}
