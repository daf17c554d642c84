use fixture::Fixture;


mod membership;
