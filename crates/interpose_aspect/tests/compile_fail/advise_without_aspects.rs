use interpose_aspect::{Aspect, AdviceSet, RegistrationError, advise};

struct Noop;

impl Aspect for Noop {
    fn advise(&self, _advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        Ok(())
    }
}

pub struct Service;

impl Service {
    #[advise(Noop)]
    pub fn get(&self) -> u32 {
        1
    }
}

fn main() {
    let _ = Noop;
    let _ = Service.get();
}
