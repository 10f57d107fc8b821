use crate::system::{System, SystemData, SystemId};

/// Object-safe form of `System`, stored in a topology's registry.
pub trait RunNow<F>: Send + Sync {
    fn run_now(&self, frame: &F);
    fn id(&self) -> SystemId;
    fn name(&self) -> &str;
}

impl<F, S> RunNow<F> for S
where
    S: System<F>,
{
    fn run_now(&self, frame: &F) {
        let data = <<S as System<F>>::SystemData<'_> as SystemData<'_, F>>::fetch(frame);
        <S as System<F>>::run(self, data);
    }

    fn id(&self) -> SystemId {
        <S as System<F>>::id(self)
    }

    fn name(&self) -> &str {
        <S as System<F>>::name(self)
    }
}
