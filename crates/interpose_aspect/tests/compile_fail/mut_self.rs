use interpose_aspect::{Aspect, AdviceSet, RegistrationError, aspects};

struct Noop;

impl Aspect for Noop {
    fn advise(&self, _advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        Ok(())
    }
}

pub struct Counter;

#[aspects(Noop)]
impl Counter {
    /// `&mut self` cannot be shared through the woven proxy.
    pub fn increment(&mut self) -> u32 {
        1
    }
}

fn main() {
    let _ = Noop;
    let _ = Counter;
}
