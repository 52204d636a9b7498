//! Operator-implementation shorthand for transparent newtypes over a numeric inner value.

/// Implements an operator trait for a single-field tuple struct by forwarding to the inner value.
///
/// The trait (`Add`, `SubAssign`, `Neg`, ...) must be in scope at the call site.
/// `op!(binary T, Add, add)` implements `Add for T`, `op!(inplace T, SubAssign, sub_assign)` the
/// in-place form, and `op!(unary T, Neg, neg)` the unary form.
#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self($trait::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            fn $method(&mut self, rhs: Self) {
                $trait::$method(&mut self.0, rhs.0);
            }
        }
    };
    (unary $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self($trait::$method(self.0))
            }
        }
    };
}
