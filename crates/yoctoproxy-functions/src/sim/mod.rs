/*!
 * In-memory implementation of the hardware seam.
 *
 * The simulated library stands in for a real Yoctopuce binding in tests and
 * demos: modules are plugged and unplugged by hand, and every function keeps
 * its attributes in library encoding.
 */

mod function;
mod layer;
mod library;

pub use function::SimFunction;
pub use layer::SimLayer;
pub use library::{SimModule, SimulatedLibrary};
