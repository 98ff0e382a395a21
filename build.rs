fn main() -> shadow_rs::SdResult<()> {
  return shadow_rs::new();
}
