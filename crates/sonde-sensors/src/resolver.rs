//! Scene graph resolution.
//!
//! A sensor is declared somewhere inside a world/model/link hierarchy. The
//! resolver walks up from the declaration to the document root and reports
//! the names of the innermost enclosing `link`, `model` and `world`.
//!
//! # Example
//!
//! ```
//! use sonde_physics::{ElementSpec, SceneDescriptor};
//! use sonde_sensors::resolver::resolve;
//!
//! let descriptor = SceneDescriptor::from_spec(
//!     &ElementSpec::new("world").attr("name", "default").child(
//!         ElementSpec::new("model").attr("name", "robot").child(
//!             ElementSpec::new("link")
//!                 .attr("name", "base")
//!                 .child(ElementSpec::new("sensor").attr("name", "ray1")),
//!         ),
//!     ),
//! );
//! let sensor = descriptor.elements_named("sensor").next().unwrap();
//!
//! let ancestry = resolve(sensor).unwrap();
//! assert_eq!(ancestry.world, "default");
//! assert_eq!(ancestry.scoped_body_name(), "root::robot::base");
//! ```

use sonde_physics::world::scoped_name;
use sonde_physics::Element;

use crate::error::ResolutionError;

/// Names of the elements enclosing a sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestry {
    /// Innermost enclosing link
    pub link: String,
    /// Innermost enclosing model
    pub model: String,
    /// Enclosing world
    pub world: String,
}

impl Ancestry {
    /// Scoped name of the body the sensor is attached to.
    #[must_use]
    pub fn scoped_body_name(&self) -> String {
        scoped_name(&self.model, &self.link)
    }
}

/// Nearest ancestor of `element` with the given tag.
#[must_use]
pub fn find_enclosing<'a>(element: Element<'a>, tag: &str) -> Option<Element<'a>> {
    element.ancestors().find(|ancestor| ancestor.name() == tag)
}

/// Resolve the link, model and world enclosing `element`.
///
/// An enclosing element without a `name` attribute resolves to the empty
/// string.
///
/// # Errors
///
/// Returns the first missing ancestor, checked in link, model, world order.
pub fn resolve(element: Element<'_>) -> Result<Ancestry, ResolutionError> {
    let link = find_enclosing(element, "link").ok_or(ResolutionError::MissingLink)?;
    let model = find_enclosing(element, "model").ok_or(ResolutionError::MissingModel)?;
    let world = find_enclosing(element, "world").ok_or(ResolutionError::MissingWorld)?;

    Ok(Ancestry {
        link: declared_name(link),
        model: declared_name(model),
        world: declared_name(world),
    })
}

fn declared_name(element: Element<'_>) -> String {
    element.value_string("name").unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonde_physics::{ElementSpec, SceneDescriptor};

    fn sensor_under(chain: &[(&str, &str)]) -> SceneDescriptor {
        let mut spec = ElementSpec::new("sensor").attr("name", "s");
        for (tag, name) in chain.iter().rev() {
            spec = ElementSpec::new(*tag).attr("name", *name).child(spec);
        }
        SceneDescriptor::from_spec(&spec)
    }

    fn resolve_in(descriptor: &SceneDescriptor) -> Result<Ancestry, ResolutionError> {
        resolve(descriptor.elements_named("sensor").next().unwrap())
    }

    #[test]
    fn test_full_chain() {
        let descriptor = sensor_under(&[("world", "w"), ("model", "m"), ("link", "l")]);
        let ancestry = resolve_in(&descriptor).unwrap();
        assert_eq!(
            ancestry,
            Ancestry {
                link: "l".into(),
                model: "m".into(),
                world: "w".into(),
            }
        );
    }

    #[test]
    fn test_missing_each_ancestor() {
        let descriptor = sensor_under(&[("world", "w"), ("model", "m")]);
        assert_eq!(resolve_in(&descriptor), Err(ResolutionError::MissingLink));

        let descriptor = sensor_under(&[("world", "w"), ("link", "l")]);
        assert_eq!(resolve_in(&descriptor), Err(ResolutionError::MissingModel));

        let descriptor = sensor_under(&[("model", "m"), ("link", "l")]);
        assert_eq!(resolve_in(&descriptor), Err(ResolutionError::MissingWorld));
    }

    #[test]
    fn test_innermost_match_wins() {
        let descriptor = sensor_under(&[
            ("world", "w"),
            ("model", "outer"),
            ("link", "outer_link"),
            ("model", "inner"),
            ("frame", "ignored"),
            ("link", "inner_link"),
        ]);
        let ancestry = resolve_in(&descriptor).unwrap();
        assert_eq!(ancestry.model, "inner");
        assert_eq!(ancestry.link, "inner_link");
        assert_eq!(ancestry.scoped_body_name(), "root::inner::inner_link");
    }

    #[test]
    fn test_unnamed_ancestor_resolves_to_empty() {
        let descriptor = SceneDescriptor::from_spec(
            &ElementSpec::new("world").child(
                ElementSpec::new("model")
                    .attr("name", "m")
                    .child(ElementSpec::new("link").child(ElementSpec::new("sensor"))),
            ),
        );
        let ancestry = resolve_in(&descriptor).unwrap();
        assert_eq!(ancestry.world, "");
        assert_eq!(ancestry.link, "");
    }

    #[test]
    fn test_root_sensor_has_no_ancestors() {
        let descriptor = SceneDescriptor::new("sensor");
        assert_eq!(resolve(descriptor.root()), Err(ResolutionError::MissingLink));
    }
}
