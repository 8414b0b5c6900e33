//! Requirement validation and registration order for extensions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use quill_extension::Extension;

use crate::error::TranslatorError;

/// Order extensions so every extension follows the extensions it requires.
///
/// The order is stable: among extensions whose requirements are satisfied,
/// the one passed first comes first.
///
/// # Errors
///
/// Returns [`TranslatorError::DuplicateExtension`] for repeated names,
/// [`TranslatorError::MissingRequirement`] for requirements that are not
/// among `extensions`, and [`TranslatorError::RequirementCycle`] if the
/// requirements cannot be ordered.
pub(crate) fn order(
    extensions: Vec<Arc<dyn Extension>>,
) -> Result<Vec<Arc<dyn Extension>>, TranslatorError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(extensions.len());
    for (i, ext) in extensions.iter().enumerate() {
        if index.insert(ext.name(), i).is_some() {
            return Err(TranslatorError::DuplicateExtension(ext.name().to_owned()));
        }
    }

    let mut in_degree = vec![0usize; extensions.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); extensions.len()];

    for (i, ext) in extensions.iter().enumerate() {
        for requirement in ext.requirements() {
            let Some(&req) = index.get(requirement.as_str()) else {
                return Err(TranslatorError::MissingRequirement {
                    extension: ext.name().to_owned(),
                    requirement: requirement.clone(),
                });
            };
            in_degree[i] += 1;
            dependents[req].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..extensions.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut sorted = Vec::with_capacity(extensions.len());

    while let Some(i) = queue.pop_front() {
        sorted.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if sorted.len() != extensions.len() {
        let placed: HashSet<usize> = sorted.into_iter().collect();
        let unresolved = extensions
            .iter()
            .enumerate()
            .filter(|(i, _)| !placed.contains(i))
            .map(|(_, ext)| ext.name().to_owned())
            .collect();
        return Err(TranslatorError::RequirementCycle {
            extensions: unresolved,
        });
    }

    let mut slots: Vec<Option<Arc<dyn Extension>>> = extensions.into_iter().map(Some).collect();
    let ordered: Vec<Arc<dyn Extension>> = sorted
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    tracing::info!(
        order = ?ordered.iter().map(|ext| ext.name()).collect::<Vec<_>>(),
        "Resolved extension order"
    );
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use quill_extension::{ExtensionCore, Options};

    use super::*;

    struct Named {
        name: &'static str,
        core: ExtensionCore,
    }

    impl Extension for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn core(&self) -> &ExtensionCore {
            &self.core
        }
    }

    fn ext(name: &'static str, requires: &[&str]) -> Arc<dyn Extension> {
        let mut core = ExtensionCore::with_options(Options::new());
        core.requires(requires.iter().copied());
        Arc::new(Named { name, core })
    }

    fn names(extensions: &[Arc<dyn Extension>]) -> Vec<&str> {
        extensions.iter().map(|ext| ext.name()).collect()
    }

    #[test]
    fn test_order_without_requirements_is_input_order() {
        let ordered = order(vec![ext("b", &[]), ext("a", &[]), ext("c", &[])]).unwrap();
        assert_eq!(names(&ordered), ["b", "a", "c"]);
    }

    #[test]
    fn test_requirements_come_first() {
        let ordered = order(vec![
            ext("figures", &["numbering", "captions"]),
            ext("captions", &["numbering"]),
            ext("links", &[]),
            ext("numbering", &[]),
        ])
        .unwrap();
        assert_eq!(names(&ordered), ["links", "numbering", "captions", "figures"]);
    }

    #[test]
    fn test_missing_requirement() {
        let err = order(vec![ext("figures", &["captions"])]).map(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            TranslatorError::MissingRequirement { ref extension, ref requirement }
                if extension == "figures" && requirement == "captions"
        ));
    }

    #[test]
    fn test_duplicate_extension() {
        let err = order(vec![ext("links", &[]), ext("links", &[])]).map(|_| ()).unwrap_err();
        assert!(matches!(err, TranslatorError::DuplicateExtension(ref name) if name == "links"));
    }

    #[test]
    fn test_cycle_lists_unresolved_extensions() {
        let err = order(vec![
            ext("base", &[]),
            ext("a", &["b"]),
            ext("b", &["a"]),
            ext("c", &["b"]),
        ])
        .map(|_| ())
        .unwrap_err();

        match err {
            TranslatorError::RequirementCycle { extensions } => {
                assert_eq!(extensions, ["a", "b", "c"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
