//! WASM bridge exposing the popsim core operations to a JavaScript host.
//!
//! Every export takes and returns plain serde payloads (see [`payload`]);
//! core errors are returned as string `JsValue`s prefixed with the failing
//! operation.

mod covariance;
pub mod payload;
mod schedule;

pub use covariance::{decorr, mvgauss, mvgauss_flat, supermatrix};
pub use schedule::{expand_events, find_position, match_labels, realize_doses};

use wasm_bindgen::JsValue;

pub(crate) fn to_js_error(context: &str, err: popsim_core::PopsimError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

#[cfg(test)]
mod tests {
    use super::{
        decorr, expand_events, find_position, match_labels, mvgauss, mvgauss_flat, realize_doses,
        supermatrix,
    };
    use std::any::type_name_of_val;

    #[test]
    fn exports_are_wired() {
        assert!(type_name_of_val(&supermatrix).ends_with("covariance::supermatrix"));
        assert!(type_name_of_val(&decorr).ends_with("covariance::decorr"));
        assert!(type_name_of_val(&mvgauss).ends_with("covariance::mvgauss"));
        assert!(type_name_of_val(&mvgauss_flat).ends_with("covariance::mvgauss_flat"));
        assert!(type_name_of_val(&expand_events).ends_with("schedule::expand_events"));
        assert!(type_name_of_val(&realize_doses).ends_with("schedule::realize_doses"));
        assert!(type_name_of_val(&find_position).ends_with("schedule::find_position"));
        assert!(type_name_of_val(&match_labels).ends_with("schedule::match_labels"));
    }
}
