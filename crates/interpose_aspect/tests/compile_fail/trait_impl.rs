use interpose_aspect::{Aspect, AdviceSet, RegistrationError, aspects};

struct Noop;

impl Aspect for Noop {
    fn advise(&self, _advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        Ok(())
    }
}

pub struct Service;

#[aspects(Noop)]
impl Default for Service {
    fn default() -> Self {
        Service
    }
}

fn main() {
    let _ = Noop;
    let _ = Service;
}
